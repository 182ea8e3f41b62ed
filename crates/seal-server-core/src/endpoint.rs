//! HTTPS server endpoint.
//!
//! `SealServer` wraps a TCP listener and a tokio-rustls acceptor, accepting
//! incoming connections with mTLS verification and serving HTTP/1.1 through
//! a [`Router`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use seal_proto::{MutualTls, PeerIdentity};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::connection::SealConnection;
use crate::error::{Result, ServerError};
use crate::router::{Router, plain_response};
use crate::settings::ServerSettings;

/// Pause after a failed `accept` (for example when out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// An HTTPS server that only talks to allow-listed peers.
pub struct SealServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    mt: MutualTls,
    settings: ServerSettings,
}

impl SealServer {
    /// Bind a TCP listener to `settings.addr`.
    ///
    /// Uses the identity and CA pool from `mt` for mTLS; its allow-list
    /// decides which clients are accepted.
    pub async fn bind(mt: &MutualTls, settings: ServerSettings) -> Result<Self> {
        let acceptor = TlsAcceptor::from(mt.server_config()?);

        let listener = TcpListener::bind(settings.addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{}: {e}", settings.addr)))?;

        info!(addr = %listener.local_addr().unwrap_or(settings.addr), "server endpoint bound");

        Ok(Self {
            listener,
            acceptor,
            mt: mt.clone(),
            settings,
        })
    }

    /// Returns the local address this endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Bind(e.to_string()))
    }

    /// Accept the next incoming connection and perform the TLS handshake.
    ///
    /// Returns a verified `SealConnection` once the peer certificate has
    /// passed CA validation and the allow-list. The handshake is bounded by
    /// `read_timeout`.
    pub async fn accept(&self) -> Result<SealConnection> {
        let (tcp, remote) = self.listener.accept().await.map_err(ServerError::Accept)?;
        debug!(%remote, "tcp connection accepted");
        handshake(&self.acceptor, &self.mt, tcp, remote, self.settings.read_timeout).await
    }

    /// Serve `router` until the process exits.
    pub async fn serve(self, router: Router) -> Result<()> {
        self.serve_with_shutdown(router, std::future::pending()).await
    }

    /// Serve `router` until `shutdown` resolves.
    ///
    /// Each connection, handshake included, runs on its own task; a failed
    /// handshake or a broken connection is logged and does not stop the
    /// server. Connections already in flight when `shutdown` fires are left
    /// to finish on their own.
    pub async fn serve_with_shutdown<F>(self, router: Router, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let router = Arc::new(router);
        tokio::pin!(shutdown);

        loop {
            let (tcp, remote) = tokio::select! {
                _ = &mut shutdown => {
                    info!("server shutting down");
                    return Ok(());
                }
                accepted = accept_retrying(|| self.listener.accept()) => accepted,
            };
            debug!(%remote, "tcp connection accepted");

            let acceptor = self.acceptor.clone();
            let mt = self.mt.clone();
            let router = Arc::clone(&router);
            let settings = self.settings.clone();
            tokio::spawn(async move {
                let conn = match handshake(&acceptor, &mt, tcp, remote, settings.read_timeout).await {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(%remote, error = %e, "rejected connection");
                        return;
                    }
                };
                let peer = conn.peer().clone();
                if let Err(e) = serve_connection(conn, router, settings).await {
                    debug!(%remote, peer = %peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Call `accept` until it succeeds, pausing [`ACCEPT_BACKOFF`] after each
/// failure.
async fn accept_retrying<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                warn!(error = %e, "accept failed, retrying");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Run the TLS handshake on an accepted socket, bounded by `timeout`, and
/// extract the verified peer.
async fn handshake(
    acceptor: &TlsAcceptor,
    mt: &MutualTls,
    tcp: TcpStream,
    remote: SocketAddr,
    timeout: Duration,
) -> Result<SealConnection> {
    let tls = tokio::time::timeout(timeout, acceptor.accept(tcp))
        .await
        .map_err(|_| ServerError::HandshakeTimeout(timeout))?
        .map_err(|e| ServerError::Handshake(format!("{remote}: {e}")))?;

    let conn = SealConnection::from_stream(tls, mt)?;
    info!(%remote, peer = %conn.peer(), "accepted connection");
    Ok(conn)
}

/// Drive one HTTP/1.1 connection to completion.
async fn serve_connection(
    conn: SealConnection,
    router: Arc<Router>,
    settings: ServerSettings,
) -> Result<()> {
    let (stream, peer) = conn.into_parts();
    let read_timeout = settings.read_timeout;
    let max_body = settings.max_body_bytes;

    let service = service_fn(move |req: Request<Incoming>| {
        let router = Arc::clone(&router);
        let peer = peer.clone();
        async move { Ok::<_, Infallible>(handle(req, router, peer, read_timeout, max_body).await) }
    });

    http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(settings.read_header_timeout)
        .serve_connection(TokioIo::new(stream), service)
        .await?;
    Ok(())
}

/// Read the request body within the limits, then route.
async fn handle(
    req: Request<Incoming>,
    router: Arc<Router>,
    peer: PeerIdentity,
    read_timeout: Duration,
    max_body: usize,
) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();

    let collected = tokio::time::timeout(read_timeout, Limited::new(body, max_body).collect()).await;
    let body = match collected {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) => {
            if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
                warn!(peer = %peer, limit = max_body, "request body too large");
                return plain_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large\n");
            }
            warn!(peer = %peer, error = %e, "failed to read request body");
            return plain_response(StatusCode::BAD_REQUEST, "failed to read request body\n");
        }
        Err(_) => {
            warn!(peer = %peer, timeout = ?read_timeout, "request body read timed out");
            return plain_response(StatusCode::REQUEST_TIMEOUT, "request timed out\n");
        }
    };

    debug!(peer = %peer, method = %parts.method, path = %parts.uri.path(), "request");
    router.dispatch(Request::from_parts(parts, body), peer).await
}
