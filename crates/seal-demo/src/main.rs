//! seal-demo - run an mTLS server and client against each other
//!
//! Without certificate paths a throwaway CA is generated and both sides get
//! a leaf for `--names`. With `--cert`, `--key` and `--ca` the given PEM
//! material is used instead.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use bytes::Bytes;
use clap::{Parser, ValueEnum};
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use seal_client_core::SealClient;
use seal_proto::identity::{CaPool, DevCa, TlsIdentity};
use seal_proto::{MutualTls, PeerIdentity};
use seal_server_core::{Router, SealServer, ServerSettings, plain_response};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// seal-demo - mutually authenticated HTTPS between allow-listed peers
#[derive(Parser, Debug)]
#[command(name = "seal-demo", version, about, long_about = None)]
struct Cli {
    /// Which side(s) to run
    #[arg(long, value_enum, env = "SEAL_MODE", default_value = "both")]
    mode: Mode,

    /// Address the server listens on
    #[arg(long, env = "SEAL_LISTEN", default_value = "127.0.0.1:8443")]
    listen: SocketAddr,

    /// URL the client requests
    #[arg(long, env = "SEAL_URL", default_value = "https://127.0.0.1:8443")]
    url: String,

    /// DNS names put in the generated leaf certificate
    #[arg(long, env = "SEAL_NAMES", value_delimiter = ',', default_value = "mypod")]
    names: Vec<String>,

    /// Peer names accepted on the other end of the connection
    #[arg(
        long,
        env = "SEAL_PEERS",
        value_delimiter = ',',
        default_value = "mypod2,mypod,mypod3"
    )]
    peers: Vec<String>,

    /// SNI value sent by the client
    #[arg(long, env = "SEAL_SERVER_NAME")]
    server_name: Option<String>,

    /// Path to the PEM certificate chain
    #[arg(long, env = "SEAL_CERT", requires_all = ["key", "ca"])]
    cert: Option<PathBuf>,

    /// Path to the PEM private key
    #[arg(long, env = "SEAL_KEY", requires_all = ["cert", "ca"])]
    key: Option<PathBuf>,

    /// Path to the PEM CA bundle
    #[arg(long, env = "SEAL_CA", requires_all = ["cert", "key"])]
    ca: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Start the server, make one request, keep serving until Ctrl-C
    Both,
    /// Only serve
    Server,
    /// Only make one request
    Client,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let (identity, ca_pool) = load_material(&cli)?;

    match cli.mode {
        Mode::Server => {
            let server = mutual(&cli, MutualTls::server(identity, ca_pool))?;
            run_server(&server, cli.listen).await
        }
        Mode::Client => {
            let client = mutual(&cli, MutualTls::client(identity, ca_pool))?;
            run_client(&client, &cli.url).await
        }
        Mode::Both => {
            let server = mutual(&cli, MutualTls::server(identity.clone(), ca_pool.clone()))?;
            let client = mutual(&cli, MutualTls::client(identity, ca_pool))?;

            let endpoint = SealServer::bind(&server, ServerSettings::default().with_addr(cli.listen))
                .await
                .context("failed to start server")?;
            let serving = tokio::spawn(endpoint.serve_with_shutdown(router(), shutdown_signal()));

            // Give the listener a moment before dialing it.
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Err(e) = run_client(&client, &cli.url).await {
                warn!(error = %e, "client request failed");
            }

            info!("serving until Ctrl-C");
            serving.await.context("server task panicked")??;
            Ok(())
        }
    }
}

/// Leaf and CA pool from the given PEM files, or from a fresh dev CA.
fn load_material(cli: &Cli) -> anyhow::Result<(TlsIdentity, CaPool)> {
    match (&cli.cert, &cli.key, &cli.ca) {
        (Some(cert), Some(key), Some(ca)) => {
            let identity = TlsIdentity::from_pem_files(cert, key)?;
            let pool = CaPool::from_pem_file(ca)?;
            info!(cert = %cert.display(), ca = %ca.display(), "loaded identity from disk");
            Ok((identity, pool))
        }
        (None, None, None) => {
            if cli.names.is_empty() {
                bail!("--names must list at least one DNS name");
            }
            let ca = DevCa::generate("seal-demo-ca")?;
            let names: Vec<&str> = cli.names.iter().map(String::as_str).collect();
            let identity = ca.issue(&names)?;
            info!(names = ?cli.names, "issued identity from a throwaway CA");
            Ok((identity, ca.ca_pool()?))
        }
        _ => bail!("--cert, --key and --ca must be given together"),
    }
}

/// Apply the allow-list and SNI options to `mt`.
fn mutual(cli: &Cli, mut mt: MutualTls) -> anyhow::Result<MutualTls> {
    for peer in &cli.peers {
        mt.add_peer(peer.as_str());
    }
    if let Some(name) = &cli.server_name {
        mt = mt.with_server_name(name)?;
    }
    Ok(mt)
}

fn router() -> Router {
    Router::new().route("/", hello)
}

async fn hello(_req: Request<Bytes>, peer: PeerIdentity) -> Response<Full<Bytes>> {
    info!(peer = %peer, "saying hello");
    plain_response(StatusCode::OK, "Hello")
}

async fn run_server(mt: &MutualTls, addr: SocketAddr) -> anyhow::Result<()> {
    let endpoint = SealServer::bind(mt, ServerSettings::default().with_addr(addr))
        .await
        .context("failed to start server")?;
    endpoint
        .serve_with_shutdown(router(), shutdown_signal())
        .await?;
    Ok(())
}

async fn run_client(mt: &MutualTls, url: &str) -> anyhow::Result<()> {
    let client = SealClient::new(mt)?;
    let req = Request::get(url)
        .header(http::header::AUTHORIZATION, "Bearer <token>")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Bytes::new())
        .context("invalid request")?;

    let response = client.send(req).await?;
    info!(peer = %response.peer, status = %response.status, "response received");
    println!("{}", response.text());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
