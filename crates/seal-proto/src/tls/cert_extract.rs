//! Extract the declared DNS names from X.509 DER certificates.
//!
//! A peer's identity is the set of `dNSName` entries in the subject
//! alternative name extension of its leaf certificate. The common name is
//! not consulted.
//!
//! Reference: `x509-parser` crate (rusticata, MIT/Apache-2.0)

use x509_parser::extensions::GeneralName;
use x509_parser::prelude::*;

use crate::error::{ProtoError, Result};

/// Return the DNS subject alternative names of a DER-encoded certificate,
/// in the order they appear.
///
/// A certificate without a SAN extension yields an empty list. Returns an
/// error if the certificate or its SAN extension cannot be parsed.
pub fn dns_names(cert_der: &[u8]) -> Result<Vec<String>> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| ProtoError::CertificateVerification(format!("X.509 parse error: {e}")))?;

    let san = cert
        .subject_alternative_name()
        .map_err(|e| ProtoError::CertificateVerification(format!("invalid SAN extension: {e}")))?;

    let Some(san) = san else {
        return Ok(Vec::new());
    };

    Ok(san
        .value
        .general_names
        .iter()
        .filter_map(|name| match name {
            GeneralName::DNSName(dns) => Some(dns.to_string()),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DevCa;

    #[test]
    fn extracts_names_in_order() {
        let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
        let identity = ca.issue(&["mypod", "mypod.seal-control.svc"]).expect("leaf");

        let names = dns_names(identity.leaf().as_ref()).expect("names");
        assert_eq!(names, vec!["mypod", "mypod.seal-control.svc"]);
    }

    #[test]
    fn ip_addresses_are_not_names() {
        let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
        let identity = ca.issue(&["mypod", "127.0.0.1"]).expect("leaf");

        let names = dns_names(identity.leaf().as_ref()).expect("names");
        assert_eq!(names, vec!["mypod"]);
    }

    #[test]
    fn ca_certificate_has_no_names() {
        let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
        let names = dns_names(ca.cert_der().as_ref()).expect("names");
        assert!(names.is_empty());
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(dns_names(b"not a certificate").is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(dns_names(b"").is_err());
    }
}
