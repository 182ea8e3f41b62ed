//! The verified identity of a connected peer.

use std::fmt;

use rustls_pki_types::CertificateDer;

use crate::error::{ProtoError, Result};
use crate::peers::{PeerAllowList, Side};
use crate::tls::cert_extract::dns_names;

/// Who the peer proved to be during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    name: String,
    dns_names: Vec<String>,
}

impl PeerIdentity {
    /// Verify a presented certificate chain against `peers`.
    ///
    /// `certs` is the chain as reported by the TLS session, leaf first. Only
    /// the leaf's DNS names are considered; chain validation is the TLS
    /// layer's job.
    pub fn verify(side: Side, peers: &PeerAllowList, certs: &[CertificateDer<'_>]) -> Result<Self> {
        let Some(leaf) = certs.first() else {
            tracing::warn!(%side, "mTLS {side}: peer presented no certificate");
            return Err(ProtoError::MissingPeerCertificate { side });
        };

        let dns_names = dns_names(leaf.as_ref())?;
        let name = peers.authorize(side, &dns_names)?.to_owned();

        Ok(Self { name, dns_names })
    }

    /// Identity of a peer whose chain the handshake verifiers already
    /// accepted.
    ///
    /// The allow-list is not enforced again: the matched name is looked up
    /// without logging, and if the list lost that name since the handshake
    /// the first declared name stands in for it.
    pub fn from_verified(
        side: Side,
        peers: &PeerAllowList,
        certs: &[CertificateDer<'_>],
    ) -> Result<Self> {
        let Some(leaf) = certs.first() else {
            return Err(ProtoError::MissingPeerCertificate { side });
        };

        let dns_names = dns_names(leaf.as_ref())?;
        let name = peers
            .first_match(&dns_names)
            .or_else(|| dns_names.first().map(String::as_str))
            .ok_or_else(|| ProtoError::PeerNotAllowed {
                side,
                expected: peers.peers(),
                presented: Vec::new(),
            })?
            .to_owned();

        Ok(Self { name, dns_names })
    }

    /// The allow-listed name the peer matched.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every DNS name declared by the peer's certificate.
    pub fn dns_names(&self) -> &[String] {
        &self.dns_names
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
