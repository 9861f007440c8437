//! Response sink handed to handlers, plus an in-memory recorder.
//!
//! Handlers set headers first, then write the status, then body bytes. The
//! first status written wins; a body write with no status implies 200.

use bytes::{Bytes, BytesMut};
use http::header::HeaderMap;
use http::{Response, StatusCode};
use serde::de::DeserializeOwned;

/// Where a handler writes its response.
pub trait ResponseWriter {
    /// Headers sent with the status line. Changes after `write_header` are ignored.
    fn headers_mut(&mut self) -> &mut HeaderMap;
    /// Send the status and headers. Only the first call has any effect.
    fn write_header(&mut self, status: u16);
    /// Append body bytes, sending a 200 status first if none was written.
    fn write(&mut self, body: &[u8]);
}

/// Records everything a handler writes, for assertions in tests and for the
/// HTTP server to turn into a real response.
#[derive(Debug, Default)]
pub struct Recorder {
    pending: HeaderMap,
    sent: Option<(u16, HeaderMap)>,
    body: BytesMut,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status written by the handler; 200 when none (or 0) was written.
    pub fn status(&self) -> u16 {
        match self.sent {
            Some((code, _)) if code != 0 => code,
            _ => 200,
        }
    }

    /// True once the status line has been written.
    pub fn wrote_header(&self) -> bool {
        self.sent.is_some()
    }

    /// Headers as sent, or as currently set when nothing was written yet.
    pub fn headers(&self) -> &HeaderMap {
        match &self.sent {
            Some((_, headers)) => headers,
            None => &self.pending,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the first JSON value in the body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let mut values = serde_json::Deserializer::from_slice(&self.body).into_iter::<T>();
        match values.next() {
            Some(value) => value,
            None => serde_json::from_slice(b""),
        }
    }

    /// Build an HTTP response. A status outside `100..=999` becomes 500.
    pub fn into_response(self) -> Response<Bytes> {
        let code = self.status();
        let headers = match self.sent {
            Some((_, headers)) => headers,
            None => self.pending,
        };
        let status = StatusCode::from_u16(code).unwrap_or_else(|_| {
            tracing::warn!(code, "handler wrote an invalid status code, sending 500");
            StatusCode::INTERNAL_SERVER_ERROR
        });
        let mut response = Response::new(self.body.freeze());
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl ResponseWriter for Recorder {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.pending
    }

    fn write_header(&mut self, status: u16) {
        if self.sent.is_some() {
            tracing::debug!(status, "superfluous write_header call ignored");
            return;
        }
        self.sent = Some((status, self.pending.clone()));
    }

    fn write(&mut self, body: &[u8]) {
        if self.sent.is_none() {
            self.write_header(200);
        }
        self.body.extend_from_slice(body);
    }
}
