//! Peer allow-list: the names a connection's peer is allowed to present.
//!
//! [`PeerAllowList`] holds the accepted peer names in insertion order. It is
//! shared as `Arc<PeerAllowList>` between the [`MutualTls`](crate::MutualTls)
//! that owns it and the rustls verifiers built from it, so names added after
//! a TLS config was built still apply to later handshakes.
//!
//! [`PeerAllowList::authorize`] is the verification predicate: a peer is
//! accepted when any DNS name on its certificate equals an allowed name.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use tracing::{info, warn};

use crate::error::{ProtoError, Result};

/// Which end of the connection is doing the verifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Accepts connections and verifies client certificates.
    Server,
    /// Opens connections and verifies the server certificate.
    Client,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Server => f.write_str("Server"),
            Side::Client => f.write_str("Client"),
        }
    }
}

/// Ordered set of accepted peer names.
#[derive(Debug, Default)]
pub struct PeerAllowList {
    names: RwLock<Vec<String>>,
}

impl PeerAllowList {
    /// Create an empty allow-list. An empty list rejects every peer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allow-list holding `names`, in order, without duplicates.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = Self::new();
        for name in names {
            list.add_peer(name);
        }
        list
    }

    /// Accept peers presenting `name`. Returns `false` if it was already listed.
    pub fn add_peer(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        let mut names = self.names.write().unwrap_or_else(PoisonError::into_inner);
        if names.contains(&name) {
            return false;
        }
        names.push(name);
        true
    }

    /// Stop accepting `name`. Returns `false` if it was not listed.
    pub fn remove_peer(&self, name: &str) -> bool {
        let mut names = self.names.write().unwrap_or_else(PoisonError::into_inner);
        let before = names.len();
        names.retain(|n| n != name);
        names.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().iter().any(|n| n == name)
    }

    /// Snapshot of the allowed names in insertion order.
    pub fn peers(&self) -> Vec<String> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Check the names a peer certificate declares against the allow-list.
    ///
    /// Declared names are tried in certificate order; the first one that is
    /// allowed is returned. Fails with [`ProtoError::PeerNotAllowed`] when no
    /// declared name is listed.
    pub fn authorize<'a>(&self, side: Side, presented: &'a [String]) -> Result<&'a str> {
        let names = self.read();
        if let Some(candidate) = first_allowed(&names, presented) {
            info!(%side, peer = %candidate, "mTLS {side}: peer verified as {candidate}");
            return Ok(candidate);
        }

        warn!(
            %side,
            expected = ?names.as_slice(),
            presented = ?presented,
            "mTLS {side}: peer rejected, no declared name is allowed"
        );
        Err(ProtoError::PeerNotAllowed {
            side,
            expected: names.clone(),
            presented: presented.to_vec(),
        })
    }

    /// The first presented name that is currently allowed, without logging.
    pub fn first_match<'a>(&self, presented: &'a [String]) -> Option<&'a str> {
        first_allowed(&self.read(), presented)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<String>> {
        self.names.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn first_allowed<'a>(allowed: &[String], presented: &'a [String]) -> Option<&'a str> {
    presented
        .iter()
        .find(|candidate| allowed.iter().any(|name| name == *candidate))
        .map(String::as_str)
}
