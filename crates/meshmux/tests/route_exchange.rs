#![cfg(unix)]

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::time::{Duration, SystemTime};

use meshmux::routing::{PublicKey, Rule, RuleKind, APP_RULE_LEN, FORWARD_RULE_LEN};
use meshmux::{Duplex, Side};
use uuid::Uuid;

fn remote_pk() -> PublicKey {
    let mut raw = [0x11u8; PublicKey::LEN];
    raw[0] = 0x03;
    PublicKey::from_bytes(raw)
}

#[test]
fn rules_cross_the_duplex_on_separate_roles() {
    let (a, b) = UnixStream::pair().expect("socket pair should be creatable");
    let node_a = Duplex::new(a, Side::Initiator).expect("node a");
    let node_b = Duplex::new(b, Side::Responder).expect("node b");

    let mut a_client = node_a.client();
    let mut a_server = node_a.server();
    let mut b_client = node_b.client();
    let mut b_server = node_b.server();
    let a_loop = node_a.spawn().expect("spawn a");
    let b_loop = node_b.spawn().expect("spawn b");

    let expire_at = SystemTime::now() + Duration::from_secs(120);
    let app = Rule::app(expire_at, 2, remote_pk(), 3, 4);
    let transport_id = Uuid::new_v4();
    let forward = Rule::forward(expire_at, 7, transport_id);

    // A's client talks to B's server; B's client talks to A's server.
    a_client.write_all(app.as_bytes()).expect("send app rule");
    b_client
        .write_all(forward.as_bytes())
        .expect("send forward rule");

    let mut app_buf = [0u8; APP_RULE_LEN];
    b_server.read_exact(&mut app_buf).expect("read app rule");
    let mut fwd_buf = [0u8; FORWARD_RULE_LEN];
    a_server.read_exact(&mut fwd_buf).expect("read forward rule");

    let got_app = Rule::try_from(&app_buf[..]).expect("app rule decodes");
    assert_eq!(got_app, app);
    assert_eq!(got_app.kind(), RuleKind::App);
    assert_eq!(got_app.remote_pk(), Some(remote_pk()));
    assert_eq!(got_app.local_port(), Some(4));

    let got_fwd = Rule::try_from(&fwd_buf[..]).expect("forward rule decodes");
    assert_eq!(got_fwd.transport_id(), Some(transport_id));
    assert_eq!(got_fwd.route_id(), 7);
    assert!(!got_fwd.is_expired(SystemTime::now()));

    a_loop.close();
    a_loop.join().expect("a closes cleanly");
    b_loop.join().expect("b sees clean eof");
}
