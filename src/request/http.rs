//! [`Connection`] over the blocking reqwest client.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};

use super::Connection;
use crate::error::{Error, Result};

/// Request timeout used by [`HttpConnection::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("etag-cache/", env!("CARGO_PKG_VERSION"));

/// Build the client used by connections that do not bring their own.
pub fn default_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DEFAULT_TIMEOUT)
        .build()?)
}

/// A single HTTP exchange sent through reqwest.
#[derive(Debug)]
pub struct HttpConnection {
    client: Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    status: Option<StatusCode>,
    response_headers: HeaderMap,
    response: Option<Response>,
}

impl HttpConnection {
    /// Prepare a request with the default client.
    pub fn new(method: &str, url: &str) -> Result<Self> {
        Self::with_client(default_client()?, method, url)
    }

    /// Prepare a `GET` request with the default client.
    pub fn get(url: &str) -> Result<Self> {
        Self::new("GET", url)
    }

    /// Prepare a request sent through `client`.
    pub fn with_client(client: Client, method: &str, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| {
            Error::InvalidMethod {
                method: method.to_string(),
            }
        })?;

        Ok(Self {
            client,
            method,
            url,
            headers: HeaderMap::new(),
            status: None,
            response_headers: HeaderMap::new(),
            response: None,
        })
    }

    /// Whether the request has been sent.
    pub fn is_sent(&self) -> bool {
        self.status.is_some()
    }

    fn send(&mut self) -> Result<StatusCode> {
        if let Some(status) = self.status {
            return Ok(status);
        }

        tracing::debug!("{} {}", self.method, self.url);
        let response = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone())
            .send()?;

        let status = response.status();
        self.response_headers = response.headers().clone();
        self.status = Some(status);
        self.response = Some(response);
        Ok(status)
    }
}

impl Connection for HttpConnection {
    type Body = Response;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    fn method(&self) -> &str {
        self.method.as_str()
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        if self.is_sent() {
            return Err(Error::RequestSent);
        }

        let invalid = || Error::InvalidHeader {
            name: name.to_string(),
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        self.headers.insert(name, value);
        Ok(())
    }

    fn status(&mut self) -> Result<u16> {
        Ok(self.send()?.as_u16())
    }

    fn response_header(&self, name: &str) -> Option<String> {
        self.response_headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }

    fn take_body(&mut self) -> Result<Response> {
        self.send()?;
        self.response.take().ok_or(Error::BodyConsumed)
    }

    fn disconnect(&mut self) {
        self.response = None;
    }
}
