//! HTTPS client endpoint.
//!
//! `SealClient` holds a tokio-rustls connector built from a [`MutualTls`]
//! and performs one HTTP/1.1 exchange per connection.

use std::time::Duration;

use bytes::Bytes;
use http::header::HOST;
use http::uri::{PathAndQuery, Scheme};
use http::{HeaderMap, HeaderValue, Request, StatusCode, Uri};
use http_body_util::Full;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use seal_proto::{MutualTls, PeerIdentity};
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use crate::connection::SealConnection;
use crate::error::{ClientError, Result};
use crate::stream_io::read_body;

const HTTPS_PORT: u16 = 443;

/// Limits applied to every request.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Time allowed to establish the TCP connection.
    pub connect_timeout: Duration,
    /// Overall bound on a request, handshake and body included. `None`
    /// waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Largest response body accepted.
    pub max_response_bytes: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            max_response_bytes: 4 * 1024 * 1024,
        }
    }
}

/// A fully read response from a verified server.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Who answered.
    pub peer: PeerIdentity,
}

impl ClientResponse {
    /// The body as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// An HTTPS client that only talks to allow-listed servers.
#[derive(Clone)]
pub struct SealClient {
    connector: TlsConnector,
    mt: MutualTls,
    settings: ClientSettings,
}

impl SealClient {
    /// Create a client with default settings.
    ///
    /// Uses the identity and CA pool from `mt` for mTLS; its allow-list
    /// decides which servers are accepted.
    pub fn new(mt: &MutualTls) -> Result<Self> {
        Self::with_settings(mt, ClientSettings::default())
    }

    pub fn with_settings(mt: &MutualTls, settings: ClientSettings) -> Result<Self> {
        Ok(Self {
            connector: TlsConnector::from(mt.client_config()?),
            mt: mt.clone(),
            settings,
        })
    }

    /// `GET uri` with no extra headers.
    pub async fn get(&self, uri: &str) -> Result<ClientResponse> {
        let req = Request::get(uri)
            .body(Bytes::new())
            .map_err(|e| ClientError::InvalidUri(e.to_string()))?;
        self.send(req).await
    }

    /// Send `req` over a fresh mTLS connection and read the whole response.
    ///
    /// The URI must be absolute with the `https` scheme.
    pub async fn send(&self, req: Request<Bytes>) -> Result<ClientResponse> {
        match self.settings.request_timeout {
            Some(after) => tokio::time::timeout(after, self.exchange(req))
                .await
                .map_err(|_| ClientError::Timeout {
                    what: "request",
                    after,
                })?,
            None => self.exchange(req).await,
        }
    }

    async fn exchange(&self, req: Request<Bytes>) -> Result<ClientResponse> {
        let target = Target::from_uri(req.uri())?;

        let conn = SealConnection::connect(
            &self.connector,
            &self.mt,
            &target.host,
            target.port,
            self.mt.server_name().clone(),
            self.settings.connect_timeout,
        )
        .await?;
        info!(peer = %conn.peer(), host = %target.host, port = target.port, "connected to server");

        let (stream, peer) = conn.into_parts();
        let (mut sender, connection) = http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "client connection closed with error");
            }
        });

        let (mut parts, body) = req.into_parts();
        parts.uri = Uri::from(target.path_and_query);
        if !parts.headers.contains_key(HOST) {
            parts.headers.insert(HOST, target.host_header);
        }
        let method = parts.method.clone();
        let path = parts.uri.clone();

        let response = sender
            .send_request(Request::from_parts(parts, Full::new(body)))
            .await?;
        let (parts, body) = response.into_parts();
        let body = read_body(body, self.settings.max_response_bytes).await?;

        debug!(peer = %peer, %method, %path, status = %parts.status, "response");

        Ok(ClientResponse {
            status: parts.status,
            headers: parts.headers,
            body,
            peer,
        })
    }
}

/// Where a request goes, split out of its absolute URI.
#[derive(Debug)]
struct Target {
    host: String,
    port: u16,
    host_header: HeaderValue,
    path_and_query: PathAndQuery,
}

impl Target {
    fn from_uri(uri: &Uri) -> Result<Self> {
        match uri.scheme() {
            Some(scheme) if *scheme == Scheme::HTTPS => {}
            Some(scheme) => {
                return Err(ClientError::InvalidUri(format!(
                    "unsupported scheme {scheme:?} in {uri}, only https is allowed"
                )));
            }
            None => {
                return Err(ClientError::InvalidUri(format!(
                    "{uri} is not an absolute https URI"
                )));
            }
        }

        let authority = uri
            .authority()
            .ok_or_else(|| ClientError::InvalidUri(format!("{uri} has no host")))?;
        let host = authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        if host.is_empty() {
            return Err(ClientError::InvalidUri(format!("{uri} has no host")));
        }
        let port = authority.port_u16().unwrap_or(HTTPS_PORT);

        let host_header = HeaderValue::from_str(authority.as_str())
            .map_err(|e| ClientError::InvalidUri(format!("{uri}: {e}")))?;
        let path_and_query = uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Ok(Self {
            host,
            port,
            host_header,
            path_and_query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(uri: &str) -> Result<Target> {
        Target::from_uri(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn https_uri_with_port() {
        let t = target("https://127.0.0.1:8443/api?x=1").unwrap();
        assert_eq!(t.host, "127.0.0.1");
        assert_eq!(t.port, 8443);
        assert_eq!(t.host_header, "127.0.0.1:8443");
        assert_eq!(t.path_and_query.as_str(), "/api?x=1");
    }

    #[test]
    fn default_port_and_path() {
        let t = target("https://seal.internal").unwrap();
        assert_eq!(t.port, 443);
        assert_eq!(t.path_and_query.as_str(), "/");
    }

    #[test]
    fn ipv6_host_is_unbracketed() {
        let t = target("https://[::1]:8443/").unwrap();
        assert_eq!(t.host, "::1");
        assert_eq!(t.host_header, "[::1]:8443");
    }

    #[test]
    fn plain_http_is_refused() {
        let err = target("http://127.0.0.1:8443/").unwrap_err();
        assert!(matches!(err, ClientError::InvalidUri(_)));
    }

    #[test]
    fn relative_uri_is_refused() {
        let err = target("/just/a/path").unwrap_err();
        assert!(matches!(err, ClientError::InvalidUri(_)));
    }

    #[test]
    fn default_settings() {
        let settings = ClientSettings::default();
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert!(settings.request_timeout.is_none());
    }
}
