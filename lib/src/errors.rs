//! Error types surfaced by the client. Every failure kind is its own variant so callers
//! can tell a misconfiguration apart from a dead endpoint or a malformed document.

use std::fmt;
use std::io;

pub type Result<T, E = SparqlError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum SparqlError {
    /// An invalid combination of settings, caught when the value is built.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// The transport could not deliver the request or its response.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The endpoint answered with a non-success HTTP status.
    #[error("Endpoint returned HTTP status {status}{}", body_suffix(.body))]
    Protocol { status: u16, body: Option<String> },
    /// The response or a serialized term could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Raw and row access were mixed on the same result set.
    #[error("Result set access mode conflict: {0}")]
    AccessMode(String),
    /// Rows were requested from a response that is not SPARQL XML.
    #[error("Cannot decode rows from a '{0}' response, use the raw response instead")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn body_suffix(body: &Option<String>) -> String {
    match body {
        Some(b) if !b.is_empty() => format!(": {b}"),
        _ => String::new(),
    }
}

impl SparqlError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SparqlError::Config(msg.into())
    }

    /// HTTP status of a protocol error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SparqlError::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure while decoding a results document or a Notation3 term.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// `position` is the byte offset into the response, `row` the index of the row
    /// being decoded when the error occurred (`None` while still in the header).
    #[error("Malformed SPARQL XML results at byte {position}{}: {message}", row_suffix(.row))]
    Xml {
        message: String,
        position: usize,
        row: Option<usize>,
    },
    /// `position` is the byte offset into the term text.
    #[error("Notation3 syntax error at offset {position}: {message}")]
    N3 { message: String, position: usize },
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(r) => format!(" (row {r})"),
        None => String::new(),
    }
}

impl DecodeError {
    pub fn position(&self) -> usize {
        match self {
            DecodeError::Xml { position, .. } | DecodeError::N3 { position, .. } => *position,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TransportErrorKind {
    Connect,
    Timeout,
    Redirect,
    Request,
    Body,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportErrorKind::Connect => write!(f, "connection failure"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Redirect => write!(f, "redirect limit exceeded"),
            TransportErrorKind::Request => write!(f, "invalid request"),
            TransportErrorKind::Body => write!(f, "body error"),
            TransportErrorKind::Other => write!(f, "transport failure"),
        }
    }
}

/// Error reported by a [`Transport`](crate::transport::Transport), passed through untouched.
#[derive(Debug, thiserror::Error)]
#[error("HTTP transport error ({kind}): {source}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
    pub fn new(
        kind: TransportErrorKind,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        TransportError {
            kind,
            source: source.into(),
        }
    }

    /// A failure while reading a response body after the headers arrived.
    pub(crate) fn body(error: io::Error) -> Self {
        let kind = match error.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportErrorKind::Timeout,
            _ => TransportErrorKind::Body,
        };
        TransportError::new(kind, error)
    }
}
