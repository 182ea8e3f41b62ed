//! Verified TLS connection wrapper (server-side).
//!
//! After the TLS handshake succeeds, `SealConnection` wraps the tokio-rustls
//! stream and caches the verified peer identity.

use seal_proto::{MutualTls, PeerIdentity};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

use crate::error::Result;

/// An accepted TLS connection with a known peer identity.
pub struct SealConnection {
    inner: TlsStream<TcpStream>,
    peer: PeerIdentity,
}

impl SealConnection {
    /// Wrap an established stream, reading the peer identity from the
    /// certificates the handshake verified.
    pub fn from_stream(stream: TlsStream<TcpStream>, mt: &MutualTls) -> Result<Self> {
        let (_, session) = stream.get_ref();
        let peer = mt.peer_identity(session.peer_certificates())?;
        Ok(Self {
            inner: stream,
            peer,
        })
    }

    /// The verified identity of the connected client.
    pub fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    /// Negotiated ALPN protocol, if any.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.inner.get_ref().1.alpn_protocol()
    }

    pub fn into_parts(self) -> (TlsStream<TcpStream>, PeerIdentity) {
        (self.inner, self.peer)
    }
}
