//! seal-control client-side transport.
//!
//! - TCP connect with tokio-rustls mTLS handshakes
//! - Server identity checked against the peer allow-list
//! - One HTTP/1.1 request per connection through hyper

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod stream_io;

pub use connection::SealConnection;
pub use endpoint::{ClientResponse, ClientSettings, SealClient};
pub use error::ClientError;
