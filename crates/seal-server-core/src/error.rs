//! Error types for the server transport layer.

use thiserror::Error;

/// Errors that can occur in the server transport.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("listener bind failed: {0}")]
    Bind(String),

    #[error("connection accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("TLS handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("HTTP connection error: {0}")]
    Http(#[from] hyper::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] seal_proto::ProtoError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
