//! seal-control server-side transport.
//!
//! - TCP listener with tokio-rustls mTLS handshakes
//! - Peer identity extraction from the verified client certificate
//! - HTTP/1.1 serving through hyper with read timeouts and body limits
//! - Path-based routing to handlers that see the caller's identity

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod router;
pub mod settings;

pub use connection::SealConnection;
pub use endpoint::SealServer;
pub use error::ServerError;
pub use router::{Handler, Router, plain_response};
pub use settings::ServerSettings;
