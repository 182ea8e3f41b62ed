//! Error types for the client transport layer.

use thiserror::Error;

/// Errors that can occur in the client transport.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid request URI: {0}")]
    InvalidUri(String),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("{what} timed out after {after:?}")]
    Timeout {
        what: &'static str,
        after: std::time::Duration,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("response body error: {0}")]
    Body(String),

    #[error("response body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("protocol error: {0}")]
    Protocol(#[from] seal_proto::ProtoError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use seal_proto::{ProtoError, Side};
    use std::error::Error as _;

    #[test]
    fn protocol_errors_keep_their_source() {
        let err: ClientError = ProtoError::MissingPeerCertificate { side: Side::Server }.into();
        assert!(matches!(err, ClientError::Protocol(_)));
        assert!(err.to_string().contains("Certificate is missing"));
        let source = err.source().expect("source");
        assert!(source.downcast_ref::<ProtoError>().is_some());
    }
}
