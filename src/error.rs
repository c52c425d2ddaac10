//! Error types surfaced by the collection source.

use thiserror::Error;

/// Failure kinds reported by discovery, the item protocol and the transport.
#[derive(Debug, Clone, Error)]
pub enum DavError {
    /// Discovery ran out of candidates without a usable collection.
    #[error("collection discovery failed: {0}")]
    DiscoveryExhausted(String),

    /// The server rejected the credentials (or a 404 was reinterpreted as such).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network-level failure: connect, lookup, timeout or a broken body.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The item or collection is gone.
    #[error("{0}")]
    NotFound(String),

    /// The server answered with something a compliant server would not send.
    #[error("protocol inconsistency: {0}")]
    ProtocolInconsistency(String),

    /// Invalid configuration, detected before talking to the server.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any status that has no dedicated mapping.
    #[error("{operation}: unexpected status {status}")]
    Status { operation: String, status: u16 },

    /// A response body that is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(String),
}

impl DavError {
    /// Map a final (non-retried) HTTP status to an error.
    pub fn from_status(operation: &str, status: u16) -> Self {
        match status {
            401 => DavError::Authentication(format!("{operation}: 401 Unauthorized")),
            404 => DavError::NotFound(format!("{operation}: object not found")),
            _ => DavError::Status {
                operation: operation.to_string(),
                status,
            },
        }
    }

    /// Status code equivalent, as the tracking framework expects it.
    pub fn status(&self) -> Option<u16> {
        match self {
            DavError::NotFound(_) => Some(404),
            DavError::Authentication(_) => Some(401),
            DavError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DavError::NotFound(_))
    }
}

impl From<quick_xml::Error> for DavError {
    fn from(err: quick_xml::Error) -> Self {
        DavError::Xml(err.to_string())
    }
}

pub type Result<T, E = DavError> = std::result::Result<T, E>;
