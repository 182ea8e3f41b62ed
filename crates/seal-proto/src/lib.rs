//! seal-control mutual-TLS primitives.
//!
//! Shared layer used by both `seal-server-core` and `seal-client-core`:
//!
//! - Identity material (certificate chain, private key, CA pool) from PEM
//! - Peer allow-list and the verification predicate
//! - rustls verifiers and config builders for both roles
//! - A throwaway development CA for demos and tests

pub mod error;
pub mod identity;
pub mod mutual;
pub mod peers;
pub mod tls;

pub use error::ProtoError;
pub use identity::{CaPool, DevCa, PeerIdentity, TlsIdentity};
pub use mutual::{MutualTls, TlsConfig};
pub use peers::{PeerAllowList, Side};
