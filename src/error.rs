//! Error types.
//!
//! Three families, split by who can act on them:
//!
//! - [`RouteError`]: a malformed route table. Raised while registering
//!   routes, before a single request is served.
//! - [`Error`]: infrastructure failures, such as binding a port or a bad
//!   environment variable.
//! - [`ContextError`]: errors a handler attaches to the request it is
//!   serving. They are collected, never thrown; see
//!   [`Context::error`](crate::Context::error).
//!
//! A lookup miss is none of these. It is a normal outcome and is routed to the
//! not-found chain.

use std::fmt;
use std::ops::{BitOr, Deref};

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by gantry's fallible infrastructure operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("unknown mode `{0}` (available modes: debug, release, test)")]
    UnknownMode(String),
}

/// A route registration that would leave the table malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("HTTP method can not be empty")]
    EmptyMethod,

    #[error("method `{0}` is not one of GET, POST, PUT, PATCH, HEAD, OPTIONS, DELETE, CONNECT, TRACE")]
    UnsupportedMethod(String),

    #[error("path `{0}` must begin with '/'")]
    MissingLeadingSlash(String),

    #[error("route `{0}` has no handlers")]
    EmptyHandlers(String),

    #[error("route `{path}` has {count} handlers, the limit is {max}")]
    TooManyHandlers { path: String, count: usize, max: usize },

    #[error("invalid segment `{segment}` in path `{path}`: a wildcard must be the whole segment and carry a name")]
    InvalidSegment { path: String, segment: String },

    #[error("catch-all `{segment}` must be the last segment in path `{path}`")]
    CatchAllNotLast { path: String, segment: String },

    #[error("wildcard `{segment}` in path `{path}` conflicts with existing wildcard `{existing}`")]
    WildcardConflict { path: String, segment: String, existing: String },

    #[error("handlers are already registered for {method} {path}")]
    DuplicateRoute { method: String, path: String },
}

// ── Handler-raised errors ─────────────────────────────────────────────────────

/// Bit flags classifying a [`ContextError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ErrorType(u64);

impl ErrorType {
    /// Failed to bind request input.
    pub const BIND: Self = Self(1 << 63);
    /// Failed to render a response body.
    pub const RENDER: Self = Self(1 << 62);
    /// Internal error, not meant for the client. The default.
    pub const PRIVATE: Self = Self(1 << 0);
    /// Error safe to show to the client.
    pub const PUBLIC: Self = Self(1 << 1);
    /// Matches every type in [`Errors::by_type`].
    pub const ANY: Self = Self(u64::MAX);

    pub fn bits(self) -> u64 {
        self.0
    }
}

impl BitOr for ErrorType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// An error attached to a request by one of its handlers.
#[derive(Debug)]
pub struct ContextError {
    err: BoxError,
    kind: ErrorType,
    meta: Option<String>,
}

impl ContextError {
    pub(crate) fn new(err: BoxError) -> Self {
        Self { err, kind: ErrorType::PRIVATE, meta: None }
    }

    pub fn kind(&self) -> ErrorType {
        self.kind
    }

    pub fn set_kind(&mut self, kind: ErrorType) -> &mut Self {
        self.kind = kind;
        self
    }

    pub fn meta(&self) -> Option<&str> {
        self.meta.as_deref()
    }

    pub fn set_meta(&mut self, meta: impl Into<String>) -> &mut Self {
        self.meta = Some(meta.into());
        self
    }

    /// True if any bit of `flags` is set on this error's type.
    pub fn is_type(&self, flags: ErrorType) -> bool {
        self.kind.0 & flags.0 > 0
    }
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.err, f)
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.err.as_ref())
    }
}

/// Every error attached to the current request, in attach order.
#[derive(Debug, Default)]
pub struct Errors(Vec<ContextError>);

impl Errors {
    pub(crate) fn push(&mut self, err: ContextError) -> &mut ContextError {
        self.0.push(err);
        let last = self.0.len() - 1;
        &mut self.0[last]
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    /// Errors whose type intersects `kind`.
    pub fn by_type(&self, kind: ErrorType) -> Vec<&ContextError> {
        self.0.iter().filter(|e| e.is_type(kind)).collect()
    }

    pub fn last(&self) -> Option<&ContextError> {
        self.0.last()
    }
}

impl Deref for Errors {
    type Target = [ContextError];

    fn deref(&self) -> &[ContextError] {
        &self.0
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            writeln!(f, "Error #{:02}: {}", i + 1, e)?;
            if let Some(meta) = &e.meta {
                writeln!(f, "     Meta: {meta}")?;
            }
        }
        Ok(())
    }
}
