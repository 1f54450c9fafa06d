//! Transport seam between requests and the HTTP client.

use std::io::Read;

use crate::error::Result;

/// One HTTP exchange as seen by the cache.
///
/// The request is sent lazily by the first call to [`Connection::status`];
/// headers must be set before that.
pub trait Connection {
    /// Response body stream.
    type Body: Read;

    /// Target URL of the request.
    fn url(&self) -> &str;

    /// Request method, upper case.
    fn method(&self) -> &str;

    /// Set a request header, replacing any previous value.
    ///
    /// Fails with [`crate::Error::RequestSent`] once the request is out.
    fn set_header(&mut self, name: &str, value: &str) -> Result<()>;

    /// Send the request if needed and return the response status code.
    fn status(&mut self) -> Result<u16>;

    /// A response header value, or `None` before sending or when absent.
    fn response_header(&self, name: &str) -> Option<String>;

    /// Take the response body, sending the request if needed.
    ///
    /// The body can be taken once; later calls fail with
    /// [`crate::Error::BodyConsumed`].
    fn take_body(&mut self) -> Result<Self::Body>;

    /// Release the underlying connection.
    fn disconnect(&mut self);
}
