//! Verified TLS connection setup (client-side).
//!
//! `SealConnection` dials the server, runs the mTLS handshake and caches the
//! verified server identity.

use std::time::Duration;

use rustls_pki_types::ServerName;
use seal_proto::{MutualTls, PeerIdentity};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use crate::error::{ClientError, Result};

/// An established TLS connection with a known peer identity.
pub struct SealConnection {
    inner: TlsStream<TcpStream>,
    peer: PeerIdentity,
}

impl SealConnection {
    /// Connect to `host:port` and complete the TLS handshake, sending
    /// `server_name` as SNI. The TCP connect is bounded by `connect_timeout`.
    pub async fn connect(
        connector: &TlsConnector,
        mt: &MutualTls,
        host: &str,
        port: u16,
        server_name: ServerName<'static>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let tcp = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ClientError::Timeout {
                what: "connect",
                after: connect_timeout,
            })?
            .map_err(|source| ClientError::Connect {
                addr: addr.clone(),
                source,
            })?;
        debug!(%addr, "tcp connected");

        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| ClientError::Handshake(format!("{addr}: {e}")))?;

        let (_, session) = tls.get_ref();
        let peer = mt.peer_identity(session.peer_certificates())?;

        Ok(Self { inner: tls, peer })
    }

    /// The verified identity of the server.
    pub fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    pub fn into_parts(self) -> (TlsStream<TcpStream>, PeerIdentity) {
        (self.inner, self.peer)
    }
}
