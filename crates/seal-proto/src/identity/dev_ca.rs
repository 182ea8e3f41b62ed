//! Throwaway in-process certificate authority for demos and tests.
//!
//! `DevCa` mints a self-signed CA and leaf certificates whose DNS subject
//! alternative names carry the peer names checked by the allow-list. Nothing
//! is persisted; every call to [`DevCa::generate`] yields a new CA.
//!
//! Reference: `rcgen` crate (rustls team, MIT/Apache-2.0)
//! <https://github.com/rustls/rcgen>

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use time::{Duration, OffsetDateTime};

use crate::error::{ProtoError, Result};
use crate::identity::material::{CaPool, TlsIdentity};

/// Certificate validity in days, for both the CA and the leaves it issues.
const VALIDITY_DAYS: i64 = 30;

/// Backdating applied to `not_before` to tolerate clock skew between peers.
const BACKDATE_DAYS: i64 = 1;

/// A PEM-encoded leaf certificate and its private key.
#[derive(Debug, Clone)]
pub struct IssuedPem {
    pub cert_pem: String,
    pub key_pem: String,
}

/// A self-signed certificate authority held in memory.
pub struct DevCa {
    cert: rcgen::Certificate,
    key: KeyPair,
}

impl DevCa {
    /// Generate a new CA key and self-signed CA certificate.
    pub fn generate(common_name: &str) -> Result<Self> {
        let key = KeyPair::generate()
            .map_err(|e| ProtoError::CertificateGeneration(format!("CA key: {e}")))?;

        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        set_validity(&mut params);

        let cert = params
            .self_signed(&key)
            .map_err(|e| ProtoError::CertificateGeneration(format!("CA certificate: {e}")))?;

        Ok(Self { cert, key })
    }

    /// Issue a leaf certificate usable for both client and server
    /// authentication, declaring `names` as DNS subject alternative names.
    ///
    /// Entries that parse as IP addresses become IP SANs instead.
    pub fn issue(&self, names: &[&str]) -> Result<TlsIdentity> {
        let (cert, key) = self.sign_leaf(names)?;
        let private_key =
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()));
        TlsIdentity::new(vec![cert.der().clone()], private_key)
    }

    /// Like [`issue`](Self::issue), returning PEM text suitable for writing
    /// to disk.
    pub fn issue_pem(&self, names: &[&str]) -> Result<IssuedPem> {
        let (cert, key) = self.sign_leaf(names)?;
        Ok(IssuedPem {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        })
    }

    /// A trust pool holding only this CA.
    pub fn ca_pool(&self) -> Result<CaPool> {
        CaPool::from_der([self.cert_der()])
    }

    pub fn cert_der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    pub fn cert_pem(&self) -> String {
        self.cert.pem()
    }

    fn sign_leaf(&self, names: &[&str]) -> Result<(rcgen::Certificate, KeyPair)> {
        let Some(first) = names.first() else {
            return Err(ProtoError::CertificateGeneration(
                "a leaf certificate needs at least one name".into(),
            ));
        };

        let key = KeyPair::generate()
            .map_err(|e| ProtoError::CertificateGeneration(format!("leaf key: {e}")))?;

        let mut params =
            CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>())
                .map_err(|e| ProtoError::CertificateGeneration(format!("invalid name: {e}")))?;
        params.distinguished_name = distinguished_name(first);
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        set_validity(&mut params);

        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .map_err(|e| ProtoError::CertificateGeneration(format!("leaf certificate: {e}")))?;

        Ok((cert, key))
    }
}

fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(
        DnType::CommonName,
        DnValue::Utf8String(common_name.to_string()),
    );
    dn.push(
        DnType::OrganizationName,
        DnValue::Utf8String("seal-control".to_string()),
    );
    dn
}

fn set_validity(params: &mut CertificateParams) {
    let now = OffsetDateTime::now_utc();
    params.not_before = now - Duration::days(BACKDATE_DAYS);
    params.not_after = now + Duration::days(VALIDITY_DAYS);
}
