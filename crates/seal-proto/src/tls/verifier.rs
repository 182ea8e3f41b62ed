//! rustls verifiers that pin peers to the allow-list.
//!
//! `PeerNameClientVerifier` (server-side) and `PeerNameServerVerifier`
//! (client-side) validate the presented chain against the [`CaPool`] and
//! then require one of the leaf's DNS names to be allow-listed. The chain is
//! always checked first, so a peer is only ever logged as verified once its
//! chain is trusted.
//!
//! Signature verification is delegated to the rustls ring crypto provider.
//!
//! [`CaPool`]: crate::identity::CaPool

use std::sync::Arc;

use rustls::client::verify_server_cert_signed_by_trust_anchor;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::server::{ParsedCertificate, WebPkiClientVerifier};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{
    DigitallySignedStruct, DistinguishedName, Error as TlsError, RootCertStore, SignatureScheme,
};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

use crate::error::{ProtoError, Result};
use crate::identity::{CaPool, PeerIdentity};
use crate::peers::{PeerAllowList, Side};

/// Check the leaf's names against the allow-list, mapping failures to a
/// rustls error that carries the rendered message.
fn authorize_leaf(
    side: Side,
    peers: &PeerAllowList,
    end_entity: &CertificateDer<'_>,
) -> std::result::Result<PeerIdentity, TlsError> {
    PeerIdentity::verify(side, peers, std::slice::from_ref(end_entity))
        .map_err(|e| TlsError::General(e.to_string()))
}

/// Get the ring provider's supported signature verification algorithms.
fn ring_signature_algorithms() -> &'static rustls::crypto::WebPkiSupportedAlgorithms {
    use std::sync::LazyLock;
    static ALGORITHMS: LazyLock<rustls::crypto::WebPkiSupportedAlgorithms> = LazyLock::new(|| {
        rustls::crypto::ring::default_provider().signature_verification_algorithms
    });
    &ALGORITHMS
}

fn ring_provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

// ---------------------------------------------------------------------------
// Client-side: verifies the server's certificate
// ---------------------------------------------------------------------------

/// Server certificate verifier used by the client.
///
/// There is no hostname check: the SNI the client sent and the address it
/// dialled play no part in identity. The chain must lead to the CA pool with
/// the server-auth usage, and the leaf must declare an allow-listed name.
#[derive(Debug)]
pub struct PeerNameServerVerifier {
    roots: Arc<RootCertStore>,
    peers: Arc<PeerAllowList>,
}

impl PeerNameServerVerifier {
    pub fn new(ca_pool: &CaPool, peers: Arc<PeerAllowList>) -> Result<Self> {
        let roots = ca_pool.roots();
        if roots.is_empty() {
            return Err(ProtoError::TlsConfiguration(
                "server verifier: CA pool is empty".into(),
            ));
        }
        Ok(Self { roots, peers })
    }
}

impl ServerCertVerifier for PeerNameServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, TlsError> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            ring_signature_algorithms().all,
        )?;

        authorize_leaf(Side::Client, &self.peers, end_entity)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        ring_signature_algorithms().supported_schemes()
    }
}

// ---------------------------------------------------------------------------
// Server-side: verifies the client's certificate
// ---------------------------------------------------------------------------

/// Client certificate verifier used by the server. Client certificates are
/// mandatory.
#[derive(Debug)]
pub struct PeerNameClientVerifier {
    inner: Arc<dyn ClientCertVerifier>,
    peers: Arc<PeerAllowList>,
}

impl PeerNameClientVerifier {
    pub fn new(ca_pool: &CaPool, peers: Arc<PeerAllowList>) -> Result<Self> {
        let inner = WebPkiClientVerifier::builder_with_provider(ca_pool.roots(), ring_provider())
            .build()
            .map_err(|e| ProtoError::TlsConfiguration(format!("client verifier: {e}")))?;
        Ok(Self { inner, peers })
    }
}

impl ClientCertVerifier for PeerNameClientVerifier {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        self.inner.root_hint_subjects()
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, TlsError> {
        let verified = self
            .inner
            .verify_client_cert(end_entity, intermediates, now)?;
        authorize_leaf(Side::Server, &self.peers, end_entity)?;
        Ok(verified)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        ring_signature_algorithms().supported_schemes()
    }
}
