//! TLS plumbing for mutual authentication.
//!
//! - Certificate name extraction (DNS SANs from X.509 DER)
//! - rustls verifiers that combine CA validation with the peer allow-list
//! - TLS config builders (server and client)

pub mod cert_extract;
pub mod config;
pub mod verifier;
