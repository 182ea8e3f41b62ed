//! The mutual-TLS configuration object shared by both roles.

use std::sync::Arc;

use rustls_pki_types::{CertificateDer, ServerName};

use crate::error::{ProtoError, Result};
use crate::identity::{CaPool, PeerIdentity, TlsIdentity};
use crate::peers::{PeerAllowList, Side};
use crate::tls::config::{build_client_tls_config, build_server_tls_config};

/// SNI sent by clients. Peer identity comes from the allow-list, not from
/// the name the client asked for.
pub const DEFAULT_SERVER_NAME: &str = "any";

/// A rustls config for one side of the connection.
#[derive(Debug, Clone)]
pub enum TlsConfig {
    Server(Arc<rustls::ServerConfig>),
    Client(Arc<rustls::ClientConfig>),
}

/// Identity, trust pool and peer allow-list for one endpoint.
///
/// The allow-list is shared with every TLS config built from this value, so
/// [`add_peer`](Self::add_peer) after building still affects later
/// handshakes.
#[derive(Debug, Clone)]
pub struct MutualTls {
    side: Side,
    identity: TlsIdentity,
    ca_pool: CaPool,
    peers: Arc<PeerAllowList>,
    server_name: ServerName<'static>,
}

impl MutualTls {
    pub fn new(side: Side, identity: TlsIdentity, ca_pool: CaPool) -> Self {
        Self {
            side,
            identity,
            ca_pool,
            peers: Arc::new(PeerAllowList::new()),
            server_name: ServerName::try_from(DEFAULT_SERVER_NAME)
                .expect("default server name is a valid DNS name")
                .to_owned(),
        }
    }

    /// Configuration for the accepting side.
    pub fn server(identity: TlsIdentity, ca_pool: CaPool) -> Self {
        Self::new(Side::Server, identity, ca_pool)
    }

    /// Configuration for the connecting side.
    pub fn client(identity: TlsIdentity, ca_pool: CaPool) -> Self {
        Self::new(Side::Client, identity, ca_pool)
    }

    /// Share an existing allow-list instead of the private one.
    pub fn with_peers(mut self, peers: Arc<PeerAllowList>) -> Self {
        self.peers = peers;
        self
    }

    /// Override the SNI sent when this config connects.
    pub fn with_server_name(mut self, name: &str) -> Result<Self> {
        self.server_name = ServerName::try_from(name)
            .map_err(|e| ProtoError::TlsConfiguration(format!("invalid server name {name:?}: {e}")))?
            .to_owned();
        Ok(self)
    }

    /// Accept peers whose certificate declares `name`.
    pub fn add_peer(&self, name: impl Into<String>) {
        self.peers.add_peer(name);
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_server(&self) -> bool {
        self.side == Side::Server
    }

    pub fn identity(&self) -> &TlsIdentity {
        &self.identity
    }

    pub fn ca_pool(&self) -> &CaPool {
        &self.ca_pool
    }

    pub fn peers(&self) -> &Arc<PeerAllowList> {
        &self.peers
    }

    pub fn server_name(&self) -> &ServerName<'static> {
        &self.server_name
    }

    /// Verify the certificates a peer presented on an established session.
    ///
    /// This is the same check the handshake verifiers run, for callers that
    /// hold a session's `peer_certificates()`.
    pub fn verify(&self, peer_certs: Option<&[CertificateDer<'_>]>) -> Result<PeerIdentity> {
        PeerIdentity::verify(self.side, &self.peers, peer_certs.unwrap_or_default())
    }

    /// Identity of the peer on a session the handshake already verified.
    ///
    /// Unlike [`verify`](Self::verify) this does not re-run the allow-list
    /// check, so it neither logs a second verification nor fails when the
    /// list changed after the handshake.
    pub fn peer_identity(&self, peer_certs: Option<&[CertificateDer<'_>]>) -> Result<PeerIdentity> {
        PeerIdentity::from_verified(self.side, &self.peers, peer_certs.unwrap_or_default())
    }

    /// Build the rustls config for this endpoint's side.
    pub fn tls_config(&self) -> Result<TlsConfig> {
        Ok(match self.side {
            Side::Server => TlsConfig::Server(Arc::new(build_server_tls_config(self)?)),
            Side::Client => TlsConfig::Client(Arc::new(build_client_tls_config(self)?)),
        })
    }

    pub fn server_config(&self) -> Result<Arc<rustls::ServerConfig>> {
        Ok(Arc::new(build_server_tls_config(self)?))
    }

    pub fn client_config(&self) -> Result<Arc<rustls::ClientConfig>> {
        Ok(Arc::new(build_client_tls_config(self)?))
    }
}
