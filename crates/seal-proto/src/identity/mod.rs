//! Node identity: the material a node presents, the pool it trusts, and the
//! verified identity of the peer on the other end.
//!
//! Issuing and rotating production certificates happens elsewhere; this
//! module only loads what it is handed. [`DevCa`] exists so demos and tests
//! have certificates to present.

pub mod dev_ca;
pub mod material;
pub mod peer;

pub use dev_ca::{DevCa, IssuedPem};
pub use material::{CaPool, TlsIdentity};
pub use peer::PeerIdentity;
