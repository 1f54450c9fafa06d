//! In-memory connection for unit tests.

use std::io::{self, Cursor};

use super::Connection;
use crate::error::{Error, Result};

/// Scripted [`Connection`] answering from memory.
///
/// Answers `304 Not Modified` with an empty body when the request carries
/// an `If-None-Match` equal to the configured validator.
#[derive(Debug)]
pub(crate) struct FakeConnection {
    url: String,
    method: String,
    status: u16,
    etag: Option<String>,
    body: Option<Cursor<Vec<u8>>>,
    not_modified_for: Option<String>,
    fail_send: bool,
    request_headers: Vec<(String, String)>,
    sent: Option<u16>,
    sends: usize,
    disconnected: bool,
}

impl FakeConnection {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: "GET".to_string(),
            status: 200,
            etag: None,
            body: Some(Cursor::new(Vec::new())),
            not_modified_for: None,
            fail_send: false,
            request_headers: Vec::new(),
            sent: None,
            sends: 0,
            disconnected: false,
        }
    }

    pub(crate) fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_string();
        self
    }

    pub(crate) fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn with_etag(mut self, etag: &str) -> Self {
        self.etag = Some(etag.to_string());
        self
    }

    pub(crate) fn with_body(mut self, body: &str) -> Self {
        self.body = Some(Cursor::new(body.as_bytes().to_vec()));
        self
    }

    pub(crate) fn not_modified_for(mut self, etag: &str) -> Self {
        self.not_modified_for = Some(etag.to_string());
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub(crate) fn body_available(&self) -> bool {
        self.body.is_some()
    }

    pub(crate) fn request_header(&self, name: &str) -> Option<&str> {
        self.request_headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn sends(&self) -> usize {
        self.sends
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

impl Connection for FakeConnection {
    type Body = Cursor<Vec<u8>>;

    fn url(&self) -> &str {
        &self.url
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        if self.sent.is_some() {
            return Err(Error::RequestSent);
        }
        self.request_headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.request_headers
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn status(&mut self) -> Result<u16> {
        if let Some(status) = self.sent {
            return Ok(status);
        }
        if self.fail_send {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        self.sends += 1;
        let matched = match (&self.not_modified_for, self.request_header("If-None-Match")) {
            (Some(expected), Some(sent)) => expected == sent,
            _ => false,
        };
        let status = if matched {
            self.body = Some(Cursor::new(Vec::new()));
            304
        } else {
            self.status
        };
        self.sent = Some(status);
        Ok(status)
    }

    fn response_header(&self, name: &str) -> Option<String> {
        self.sent?;
        if name.eq_ignore_ascii_case("etag") {
            self.etag.clone()
        } else {
            None
        }
    }

    fn take_body(&mut self) -> Result<Self::Body> {
        self.status()?;
        self.body.take().ok_or(Error::BodyConsumed)
    }

    fn disconnect(&mut self) {
        self.disconnected = true;
        self.body = None;
    }
}
