//! Error types for the seal-control mTLS layer.
//!
//! Verification failures keep the exact wording peers and operators see in
//! logs (`mTLS Server: ...` / `mTLS Client: ...`); the rustls verifiers
//! forward the rendered message as `rustls::Error::General`.

use thiserror::Error;

use crate::peers::Side;

/// Errors that can occur within the `seal-proto` crate.
#[derive(Debug, Error)]
pub enum ProtoError {
    // --- Identity material ---
    #[error("failed to read {what} from {path}: {source}")]
    ReadFile {
        what: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PEM data: {0}")]
    InvalidPem(String),

    #[error("no certificates found in {0}")]
    NoCertificates(String),

    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    #[error("invalid trust anchor: {0}")]
    InvalidTrustAnchor(String),

    #[error("failed to generate certificate: {0}")]
    CertificateGeneration(String),

    // --- Peer verification ---
    #[error("mTLS {side}: Failed to verify connection. Certificate is missing")]
    MissingPeerCertificate { side: Side },

    #[error("mTLS {side}: Failed to verify - Looking for: {expected:?}, but peer names are: {presented:?}")]
    PeerNotAllowed {
        side: Side,
        expected: Vec<String>,
        presented: Vec<String>,
    },

    #[error("certificate verification failed: {0}")]
    CertificateVerification(String),

    // --- TLS ---
    #[error("TLS configuration error: {0}")]
    TlsConfiguration(String),
}

/// Result type alias using [`ProtoError`].
pub type Result<T> = std::result::Result<T, ProtoError>;

impl ProtoError {
    /// Whether the error is a peer-identity rejection, as opposed to a
    /// malformed certificate or configuration problem.
    pub fn is_peer_rejection(&self) -> bool {
        matches!(
            self,
            ProtoError::MissingPeerCertificate { .. } | ProtoError::PeerNotAllowed { .. }
        )
    }
}
