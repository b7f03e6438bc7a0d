//! Response state for one request.
//!
//! [`ResponseWriter`] buffers status, headers and body while the chain runs
//! and remembers whether the headers were "flushed". Nothing reaches the
//! transport until the chain returns; the flag exists so later handlers, and
//! the not-found fallback, can tell that someone upstream already answered.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::StatusCode;
use tracing::warn;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Context::bytes`](crate::Context::bytes).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    MsgPack,      // application/msgpack
    OctetStream,  // application/octet-stream  (binary / file download)
    Pdf,          // application/pdf
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::MsgPack     => "application/msgpack",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }

    pub(crate) fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// Buffered response plus the "headers flushed" mirror.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    /// `None` until the headers are flushed, then the body byte count.
    size: Option<usize>,
}

impl ResponseWriter {
    pub(crate) fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            size: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.size = None;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status. Ignored, with a warning, once headers are flushed.
    pub fn set_status(&mut self, code: StatusCode) {
        if self.written() && code != self.status {
            warn!(
                current = self.status.as_u16(),
                ignored = code.as_u16(),
                "headers were already written"
            );
            return;
        }
        self.status = code;
    }

    /// Bytes written to the body so far.
    pub fn size(&self) -> usize {
        self.size.unwrap_or(0)
    }

    /// True once the headers are flushed, with or without a body.
    pub fn written(&self) -> bool {
        self.size.is_some()
    }

    /// Marks the headers as flushed with the current status.
    pub fn write_header_now(&mut self) {
        if self.size.is_none() {
            self.size = Some(0);
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Appends to the body, flushing headers first. Returns the byte count.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.write_header_now();
        self.body.extend_from_slice(data);
        self.size = Some(self.body.len());
        data.len()
    }

    pub(crate) fn set_content_type(&mut self, content_type: ContentType) {
        self.headers
            .entry(CONTENT_TYPE)
            .or_insert_with(|| content_type.header_value());
    }

    /// Moves the buffered response out, leaving the writer ready for reuse.
    pub(crate) fn take_response(&mut self) -> http::Response<Bytes> {
        let mut res = http::Response::new(Bytes::from(std::mem::take(&mut self.body)));
        *res.status_mut() = self.status;
        *res.headers_mut() = std::mem::take(&mut self.headers);
        res
    }
}

/// Whether `status` may carry a body (RFC 9110 §6.4.1).
pub(crate) fn body_allowed_for_status(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}
