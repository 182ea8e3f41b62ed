//! TLS configuration builders for the server and client roles.
//!
//! Constructs `rustls::ServerConfig` and `rustls::ClientConfig` from a
//! [`MutualTls`] with the allow-list verifiers installed.
//!
//! Both builders enforce:
//! - Ring crypto provider with rustls' safe default protocol versions
//! - The node's own certificate presented in either role
//! - ALPN `http/1.1`
//! - No session resumption, so every connection re-runs peer verification

use std::sync::Arc;

use rustls::client::Resumption;
use rustls::client::danger::ServerCertVerifier;
use rustls::server::NoServerSessionStorage;
use rustls::server::danger::ClientCertVerifier;

use crate::error::{ProtoError, Result};
use crate::mutual::MutualTls;
use crate::tls::verifier::{PeerNameClientVerifier, PeerNameServerVerifier};

/// ALPN protocol identifier; HTTP/1.1 is the only protocol spoken.
pub const ALPN_HTTP11: &[u8] = b"http/1.1";

/// Build a `rustls::ServerConfig` for the accepting side.
///
/// The config requires client certificates (mTLS), validates them against
/// the CA pool and checks them against the peer allow-list.
pub fn build_server_tls_config(mt: &MutualTls) -> Result<rustls::ServerConfig> {
    let verifier: Arc<dyn ClientCertVerifier> = Arc::new(PeerNameClientVerifier::new(
        mt.ca_pool(),
        Arc::clone(mt.peers()),
    )?);

    let identity = mt.identity();

    let mut config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| ProtoError::TlsConfiguration(format!("TLS version config: {e}")))?
    .with_client_cert_verifier(verifier)
    .with_single_cert(
        identity.cert_chain().to_vec(),
        identity.private_key().clone_key(),
    )
    .map_err(|e| ProtoError::TlsConfiguration(format!("server cert config: {e}")))?;

    config.alpn_protocols = vec![ALPN_HTTP11.to_vec()];
    config.session_storage = Arc::new(NoServerSessionStorage {});
    config.send_tls13_tickets = 0;

    Ok(config)
}

/// Build a `rustls::ClientConfig` for the connecting side.
///
/// The config presents a client certificate for mTLS and accepts the server
/// only if its chain validates against the CA pool and it carries an
/// allow-listed name.
pub fn build_client_tls_config(mt: &MutualTls) -> Result<rustls::ClientConfig> {
    let verifier: Arc<dyn ServerCertVerifier> = Arc::new(PeerNameServerVerifier::new(
        mt.ca_pool(),
        Arc::clone(mt.peers()),
    )?);

    let identity = mt.identity();

    let mut config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| ProtoError::TlsConfiguration(format!("TLS version config: {e}")))?
    .dangerous()
    .with_custom_certificate_verifier(verifier)
    .with_client_auth_cert(
        identity.cert_chain().to_vec(),
        identity.private_key().clone_key(),
    )
    .map_err(|e| ProtoError::TlsConfiguration(format!("client cert config: {e}")))?;

    config.alpn_protocols = vec![ALPN_HTTP11.to_vec()];
    config.resumption = Resumption::disabled();

    Ok(config)
}
