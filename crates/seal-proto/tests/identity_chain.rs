//! Integration tests: end-to-end identity chain.
//!
//! Exercises the path a node takes at startup: identity material arrives as
//! PEM, is loaded into a `MutualTls`, and the allow-list decides which peer
//! certificates are acceptable.

use std::path::PathBuf;

use seal_proto::identity::{CaPool, DevCa, TlsIdentity};
use seal_proto::tls::cert_extract::dns_names;
use seal_proto::{MutualTls, PeerAllowList, ProtoError, Side};

/// Write `contents` to a unique file under the system temp dir.
fn temp_file(tag: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "seal-proto-{}-{}-{tag}.pem",
        std::process::id(),
        unique_suffix()
    ));
    std::fs::write(&path, contents).expect("write temp file");
    path
}

fn unique_suffix() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// PEM on disk → MutualTls → verification
// ---------------------------------------------------------------------------

#[test]
fn pem_files_load_into_mutual_tls() {
    let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
    let issued = ca.issue_pem(&["mypod"]).expect("leaf");

    let cert_path = temp_file("cert", &issued.cert_pem);
    let key_path = temp_file("key", &issued.key_pem);
    let ca_path = temp_file("ca", &ca.cert_pem());

    let identity = TlsIdentity::from_pem_files(&cert_path, &key_path).expect("identity");
    let pool = CaPool::from_pem_file(&ca_path).expect("pool");

    let mt = MutualTls::server(identity, pool);
    mt.add_peer("mypod");
    assert!(mt.server_config().is_ok());

    let names = dns_names(mt.identity().leaf().as_ref()).expect("names");
    assert_eq!(names, vec!["mypod"]);

    for path in [cert_path, key_path, ca_path] {
        let _ = std::fs::remove_file(path);
    }
}

#[test]
fn ca_bundle_with_several_anchors() {
    let a = DevCa::generate("ca-a").expect("a");
    let b = DevCa::generate("ca-b").expect("b");
    let bundle = format!("{}{}", a.cert_pem(), b.cert_pem());

    let pool = CaPool::from_pem(bundle.as_bytes()).expect("pool");
    assert_eq!(pool.len(), 2);
}

#[test]
fn missing_key_file_is_reported() {
    let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
    let issued = ca.issue_pem(&["mypod"]).expect("leaf");
    let cert_path = temp_file("cert", &issued.cert_pem);

    let err = TlsIdentity::from_pem_files(&cert_path, "/nonexistent/seal/key.pem").unwrap_err();
    assert!(matches!(err, ProtoError::ReadFile { what: "private key", .. }));

    let _ = std::fs::remove_file(cert_path);
}

// ---------------------------------------------------------------------------
// Verification property: accept iff names intersect the allow-list
// ---------------------------------------------------------------------------

#[test]
fn accept_exactly_when_names_intersect() {
    let ca = DevCa::generate("seal-ctrl-ca").expect("ca");
    let allowed = ["mypod2", "mypod", "mypod3"];
    let peers = PeerAllowList::from_names(allowed);

    let cases: &[(&[&str], bool)] = &[
        (&["mypod"], true),
        (&["mypod3"], true),
        (&["other", "mypod2"], true),
        (&["other"], false),
        (&["mypod4", "pod"], false),
        (&["MYPOD"], false),
    ];

    for (declared, expected) in cases {
        let leaf = ca.issue(declared).expect("leaf");
        let result = seal_proto::PeerIdentity::verify(Side::Server, &peers, leaf.cert_chain());
        assert_eq!(
            result.is_ok(),
            *expected,
            "declared {declared:?} against {allowed:?}: {result:?}"
        );
    }
}
