//! Certificate, private key and trust pool loading.
//!
//! [`TlsIdentity`] is what a node presents during the handshake; [`CaPool`]
//! is what it validates the peer's chain against. Both come from PEM, the
//! format the provisioning side hands out.

use std::fmt;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::RootCertStore;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{ProtoError, Result};

/// A certificate chain (leaf first) and the matching private key.
pub struct TlsIdentity {
    cert_chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
}

impl TlsIdentity {
    /// Build an identity from an already-decoded chain and key.
    pub fn new(
        cert_chain: Vec<CertificateDer<'static>>,
        private_key: PrivateKeyDer<'static>,
    ) -> Result<Self> {
        if cert_chain.is_empty() {
            return Err(ProtoError::NoCertificates("certificate chain".into()));
        }
        Ok(Self {
            cert_chain,
            private_key,
        })
    }

    /// Parse a PEM certificate chain and a PEM private key (PKCS#8, PKCS#1
    /// or SEC1).
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let cert_chain = rustls_pemfile::certs(&mut BufReader::new(cert_pem))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ProtoError::InvalidPem(format!("certificate chain: {e}")))?;
        if cert_chain.is_empty() {
            return Err(ProtoError::NoCertificates("certificate PEM".into()));
        }

        let private_key = rustls_pemfile::private_key(&mut BufReader::new(key_pem))
            .map_err(|e| ProtoError::InvalidPem(format!("private key: {e}")))?
            .ok_or_else(|| ProtoError::NoPrivateKey("key PEM".into()))?;

        Ok(Self {
            cert_chain,
            private_key,
        })
    }

    /// Read and parse a PEM certificate chain file and a PEM key file.
    pub fn from_pem_files(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        let cert_pem = read_file("certificate", cert_path.as_ref())?;
        let key_pem = read_file("private key", key_path.as_ref())?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// The leaf certificate.
    pub fn leaf(&self) -> &CertificateDer<'static> {
        // Non-empty by construction.
        &self.cert_chain[0]
    }

    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }

    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.private_key
    }
}

impl Clone for TlsIdentity {
    fn clone(&self) -> Self {
        Self {
            cert_chain: self.cert_chain.clone(),
            private_key: self.private_key.clone_key(),
        }
    }
}

impl fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsIdentity")
            .field("chain_len", &self.cert_chain.len())
            .finish_non_exhaustive()
    }
}

/// Trust anchors used to validate the peer's certificate chain.
///
/// The same pool serves both roles: the server checks client certificates
/// against it and the client checks the server certificate against it.
#[derive(Debug, Clone)]
pub struct CaPool {
    roots: Arc<RootCertStore>,
}

impl CaPool {
    /// Build a pool from DER-encoded CA certificates.
    pub fn from_der<I>(certs: I) -> Result<Self>
    where
        I: IntoIterator<Item = CertificateDer<'static>>,
    {
        let mut roots = RootCertStore::empty();
        for cert in certs {
            roots
                .add(cert)
                .map_err(|e| ProtoError::InvalidTrustAnchor(e.to_string()))?;
        }
        if roots.is_empty() {
            return Err(ProtoError::NoCertificates("CA pool".into()));
        }
        Ok(Self {
            roots: Arc::new(roots),
        })
    }

    /// Parse one or more PEM CA certificates.
    pub fn from_pem(ca_pem: &[u8]) -> Result<Self> {
        let certs = rustls_pemfile::certs(&mut BufReader::new(ca_pem))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ProtoError::InvalidPem(format!("CA bundle: {e}")))?;
        Self::from_der(certs)
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let ca_pem = read_file("CA bundle", path.as_ref())?;
        Self::from_pem(&ca_pem)
    }

    pub fn roots(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn read_file(what: &'static str, path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| ProtoError::ReadFile {
        what,
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DevCa;

    #[test]
    fn identity_round_trips_through_pem() {
        let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
        let issued = ca.issue_pem(&["mypod"]).expect("leaf");

        let identity =
            TlsIdentity::from_pem(issued.cert_pem.as_bytes(), issued.key_pem.as_bytes())
                .expect("identity should parse");
        assert_eq!(identity.cert_chain().len(), 1);
        assert!(matches!(identity.private_key(), PrivateKeyDer::Pkcs8(_)));
    }

    #[test]
    fn identity_rejects_missing_key() {
        let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
        let issued = ca.issue_pem(&["mypod"]).expect("leaf");

        let err = TlsIdentity::from_pem(issued.cert_pem.as_bytes(), b"").unwrap_err();
        assert!(matches!(err, ProtoError::NoPrivateKey(_)));
    }

    #[test]
    fn identity_rejects_missing_certificate() {
        let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
        let issued = ca.issue_pem(&["mypod"]).expect("leaf");

        let err = TlsIdentity::from_pem(b"", issued.key_pem.as_bytes()).unwrap_err();
        assert!(matches!(err, ProtoError::NoCertificates(_)));
    }

    #[test]
    fn identity_rejects_empty_chain() {
        let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
        let identity = ca.issue(&["mypod"]).expect("leaf");
        let err = TlsIdentity::new(Vec::new(), identity.private_key().clone_key()).unwrap_err();
        assert!(matches!(err, ProtoError::NoCertificates(_)));
    }

    #[test]
    fn ca_pool_from_pem() {
        let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
        let pool = CaPool::from_pem(ca.cert_pem().as_bytes()).expect("pool");
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn ca_pool_rejects_empty_bundle() {
        let err = CaPool::from_pem(b"").unwrap_err();
        assert!(matches!(err, ProtoError::NoCertificates(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = CaPool::from_pem_file("/nonexistent/seal/ca.pem").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("CA bundle"), "{msg}");
        assert!(msg.contains("/nonexistent/seal/ca.pem"), "{msg}");
    }
}
