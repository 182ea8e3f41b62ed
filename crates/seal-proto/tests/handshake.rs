//! Integration tests: full rustls handshakes driven in memory.
//!
//! Each test builds a server and a client `MutualTls`, pumps TLS records
//! between a `ServerConnection` and a `ClientConnection` without sockets, and
//! checks which side (if any) refused the peer.

use rustls::{ClientConnection, ServerConnection};
use rustls_pki_types::ServerName;
use seal_proto::identity::DevCa;
use seal_proto::{MutualTls, PeerIdentity, Side};

/// Which side of the pump failed, and why.
#[derive(Debug)]
enum PumpError {
    Server(rustls::Error),
    Client(rustls::Error),
    Stalled,
}

/// Move records back and forth until both sides finish the handshake or one
/// of them fails.
fn handshake(client: &mut ClientConnection, server: &mut ServerConnection) -> Result<(), PumpError> {
    for _ in 0..16 {
        let mut buf = Vec::new();
        while client.wants_write() {
            client.write_tls(&mut buf).expect("client write_tls");
        }
        let mut rd = buf.as_slice();
        while !rd.is_empty() {
            server.read_tls(&mut rd).expect("server read_tls");
            server.process_new_packets().map_err(PumpError::Server)?;
        }

        let mut buf = Vec::new();
        while server.wants_write() {
            server.write_tls(&mut buf).expect("server write_tls");
        }
        let mut rd = buf.as_slice();
        while !rd.is_empty() {
            client.read_tls(&mut rd).expect("client read_tls");
            client.process_new_packets().map_err(PumpError::Client)?;
        }

        if !client.is_handshaking() && !server.is_handshaking() {
            return Ok(());
        }
    }
    Err(PumpError::Stalled)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_target(true)
        .try_init();
}

/// Server and client identities issued by one CA.
struct Pair {
    server: MutualTls,
    client: MutualTls,
}

fn pair(ca: &DevCa, server_names: &[&str], client_names: &[&str]) -> Pair {
    let pool = ca.ca_pool().expect("pool");
    Pair {
        server: MutualTls::server(ca.issue(server_names).expect("server leaf"), pool.clone()),
        client: MutualTls::client(ca.issue(client_names).expect("client leaf"), pool),
    }
}

fn connect(pair: &Pair) -> (ClientConnection, ServerConnection) {
    let client = ClientConnection::new(
        pair.client.client_config().expect("client config"),
        pair.client.server_name().clone(),
    )
    .expect("client connection");
    let server =
        ServerConnection::new(pair.server.server_config().expect("server config")).expect("server connection");
    (client, server)
}

// ---------------------------------------------------------------------------
// Both sides accept allow-listed peers
// ---------------------------------------------------------------------------

#[test]
fn allowed_peers_complete_handshake() {
    init_tracing();
    let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
    let pair = pair(&ca, &["mypod"], &["mypod"]);
    for name in ["mypod2", "mypod", "mypod3"] {
        pair.server.add_peer(name);
        pair.client.add_peer(name);
    }

    let (mut client, mut server) = connect(&pair);
    handshake(&mut client, &mut server).expect("handshake should succeed");

    let seen_by_server = pair
        .server
        .verify(server.peer_certificates())
        .expect("server sees verified client");
    let seen_by_client = pair
        .client
        .verify(client.peer_certificates())
        .expect("client sees verified server");
    assert_eq!(seen_by_server.name(), "mypod");
    assert_eq!(seen_by_client.name(), "mypod");
    assert_eq!(server.alpn_protocol(), Some(&b"http/1.1"[..]));
}

#[test]
fn distinct_names_per_role() {
    init_tracing();
    let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
    let pair = pair(&ca, &["activator"], &["queue-proxy"]);
    pair.server.add_peer("queue-proxy");
    pair.client.add_peer("activator");

    let (mut client, mut server) = connect(&pair);
    handshake(&mut client, &mut server).expect("handshake should succeed");

    let client_identity: PeerIdentity = pair.server.verify(server.peer_certificates()).unwrap();
    assert_eq!(client_identity.name(), "queue-proxy");
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn server_rejects_unlisted_client() {
    init_tracing();
    let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
    let pair = pair(&ca, &["mypod"], &["intruder"]);
    pair.server.add_peer("mypod");
    pair.client.add_peer("mypod");

    let (mut client, mut server) = connect(&pair);
    match handshake(&mut client, &mut server) {
        Err(PumpError::Server(err)) => {
            let msg = err.to_string();
            assert!(msg.contains("mTLS Server"), "{msg}");
            assert!(msg.contains("intruder"), "{msg}");
        }
        other => panic!("expected server-side rejection, got {other:?}"),
    }
}

#[test]
fn client_rejects_unlisted_server() {
    init_tracing();
    let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
    let pair = pair(&ca, &["impostor"], &["mypod"]);
    pair.server.add_peer("mypod");
    pair.client.add_peer("mypod");

    let (mut client, mut server) = connect(&pair);
    match handshake(&mut client, &mut server) {
        Err(PumpError::Client(err)) => {
            let msg = err.to_string();
            assert!(msg.contains("mTLS Client"), "{msg}");
            assert!(msg.contains("Looking for"), "{msg}");
        }
        other => panic!("expected client-side rejection, got {other:?}"),
    }
}

#[test]
fn server_rejects_client_from_foreign_ca() {
    init_tracing();
    let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
    let rogue = DevCa::generate("rogue-ca").expect("rogue");
    let pool = ca.ca_pool().unwrap();

    let server = MutualTls::server(ca.issue(&["mypod"]).unwrap(), pool.clone());
    server.add_peer("mypod");
    // The rogue client trusts the real CA, so it accepts the server, but its
    // own certificate chains to the rogue CA.
    let client = MutualTls::client(rogue.issue(&["mypod"]).unwrap(), pool);
    client.add_peer("mypod");

    let pair = Pair { server, client };
    let (mut client, mut server) = connect(&pair);
    assert!(matches!(
        handshake(&mut client, &mut server),
        Err(PumpError::Server(_))
    ));
}

#[test]
fn empty_allow_list_rejects_everyone() {
    init_tracing();
    let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
    let pair = pair(&ca, &["mypod"], &["mypod"]);
    pair.server.add_peer("mypod");

    let (mut client, mut server) = connect(&pair);
    assert!(matches!(
        handshake(&mut client, &mut server),
        Err(PumpError::Client(_))
    ));
}

#[test]
fn sni_does_not_affect_identity() {
    init_tracing();
    let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
    let pair = pair(&ca, &["mypod"], &["mypod"]);
    pair.server.add_peer("mypod");
    pair.client.add_peer("mypod");

    let mut client = ClientConnection::new(
        pair.client.client_config().unwrap(),
        ServerName::try_from("unrelated.example").unwrap(),
    )
    .unwrap();
    let mut server = ServerConnection::new(pair.server.server_config().unwrap()).unwrap();
    handshake(&mut client, &mut server).expect("handshake should succeed");
}

#[test]
fn sides_are_reported() {
    let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
    let pair = pair(&ca, &["mypod"], &["mypod"]);
    assert_eq!(pair.server.side(), Side::Server);
    assert_eq!(pair.client.side(), Side::Client);
}
