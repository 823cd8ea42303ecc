#![cfg(unix)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::Duration;

use meshmux_duplex::{
    CloseReason, Duplex, DuplexConfig, DuplexError, DuplexState, Endpoint, Side, MAX_PAYLOAD,
};
use meshmux_frame::FrameError;

fn duplex_pair(a_side: Side, b_side: Side) -> (Duplex<UnixStream>, Duplex<UnixStream>) {
    let (a, b) = UnixStream::pair().expect("socket pair should be creatable");
    (
        Duplex::new(a, a_side).expect("duplex a should build"),
        Duplex::new(b, b_side).expect("duplex b should build"),
    )
}

fn read_exactly<T: meshmux_transport::Conn>(endpoint: &Endpoint<T>, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let mut reader = endpoint;
    reader
        .read_exact(&mut out)
        .expect("endpoint should deliver the full payload");
    out
}

#[test]
fn initiator_client_reaches_responder_server() {
    let (a, b) = duplex_pair(Side::Initiator, Side::Responder);
    let a_client = a.client();
    let b_server = b.server();
    let b_client = b.client();
    let _a_loop = a.spawn().expect("spawn a");
    let _b_loop = b.spawn().expect("spawn b");

    assert_eq!(a_client.send(b"foo").expect("write foo"), 3);
    assert_eq!(read_exactly(&b_server, 3), b"foo");
    assert_eq!(b_client.buffered(), 0);
}

#[test]
fn responder_client_reaches_initiator_server() {
    let (a, b) = duplex_pair(Side::Initiator, Side::Responder);
    let a_server = a.server();
    let a_client = a.client();
    let b_client = b.client();
    let _a_loop = a.spawn().expect("spawn a");
    let _b_loop = b.spawn().expect("spawn b");

    b_client.send(b"foo").expect("write foo");
    assert_eq!(read_exactly(&a_server, 3), b"foo");
    assert_eq!(a_client.buffered(), 0);
}

fn sequenced(tag: u8, seq: u32, len: usize) -> Vec<u8> {
    let mut record = vec![tag; len];
    record[..4].copy_from_slice(&seq.to_be_bytes());
    record
}

fn assert_in_order(stream: &[u8], tag: u8, len: usize, rounds: usize) {
    assert_eq!(stream.len(), rounds * len);
    for (expected, record) in stream.chunks(len).enumerate() {
        let seq = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
        assert_eq!(seq as usize, expected, "record out of order");
        assert!(record[4..].iter().all(|&byte| byte == tag), "record {expected} mixed");
    }
}

#[test]
fn concurrent_roles_never_mix() {
    let (a, b) = duplex_pair(Side::Initiator, Side::Responder);
    let a_client = a.client();
    let a_server = a.server();
    let b_client = b.client();
    let b_server = b.server();
    let _a_loop = a.spawn().expect("spawn a");
    let _b_loop = b.spawn().expect("spawn b");

    const ROUNDS: usize = 200;
    const CLIENT_LEN: usize = 8;
    const SERVER_LEN: usize = 11;
    let writer_c = thread::spawn(move || {
        for seq in 0..ROUNDS as u32 {
            a_client
                .send(&sequenced(b'c', seq, CLIENT_LEN))
                .expect("client write");
        }
    });
    let writer_s = thread::spawn(move || {
        for seq in 0..ROUNDS as u32 {
            a_server
                .send(&sequenced(b's', seq, SERVER_LEN))
                .expect("server write");
        }
    });

    let from_client = read_exactly(&b_server, ROUNDS * CLIENT_LEN);
    let from_server = read_exactly(&b_client, ROUNDS * SERVER_LEN);
    writer_c.join().expect("client writer");
    writer_s.join().expect("server writer");

    assert_in_order(&from_client, b'c', CLIENT_LEN, ROUNDS);
    assert_in_order(&from_server, b's', SERVER_LEN, ROUNDS);
    assert_eq!(b_server.buffered(), 0);
    assert_eq!(b_client.buffered(), 0);
}

#[test]
fn roundtrip_boundary_sizes_with_varied_reads() {
    let (a, b) = duplex_pair(Side::Initiator, Side::Responder);
    let a_client = a.client();
    let b_server = b.server();
    let _a_loop = a.spawn().expect("spawn a");
    let _b_loop = b.spawn().expect("spawn b");

    for (size, chunk) in [(0usize, 1usize), (1, 1), (4096, 7), (MAX_PAYLOAD, 1000)] {
        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        assert_eq!(a_client.send(&payload).expect("send"), size);

        let mut got = Vec::with_capacity(size);
        let mut buf = vec![0u8; chunk];
        while got.len() < size {
            let n = b_server.recv(&mut buf).expect("recv");
            assert!(n > 0 && n <= chunk);
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, payload, "payload of {size} bytes");
    }
}

#[test]
fn short_read_keeps_the_rest_queued() {
    let (mut a, b) = duplex_pair(Side::Initiator, Side::Responder);
    b.server().send(b"abcdef").expect("send");

    let header = a.read_header().expect("header");
    a.forward(header.prefix, header.len).expect("forward");

    let client = a.client();
    let mut buf = [0u8; 4];
    assert_eq!(client.recv(&mut buf).expect("first read"), 4);
    assert_eq!(&buf, b"abcd");
    assert_eq!(client.buffered(), 2);
    assert_eq!(client.recv(&mut buf).expect("second read"), 2);
    assert_eq!(&buf[..2], b"ef");
}

#[test]
fn zero_length_read_returns_immediately() {
    let (a, _b) = duplex_pair(Side::Initiator, Side::Responder);
    let mut empty = [0u8; 0];
    assert_eq!(a.client().recv(&mut empty).expect("empty read"), 0);
    assert!(!a.client().is_closed());
}

#[test]
fn empty_frame_is_legal_and_delivers_nothing() {
    let (a, mut b) = duplex_pair(Side::Initiator, Side::Responder);
    assert_eq!(a.client().send(b"").expect("empty send"), 0);

    let header = b.read_header().expect("header");
    assert_eq!((header.prefix, header.len), (0, 0));
    b.forward(header.prefix, header.len).expect("forward");
    assert_eq!(b.server().buffered(), 0);
    assert_eq!(b.state(), DuplexState::AwaitingHeader);
}

#[test]
fn oversized_write_fails_and_keeps_duplex_usable() {
    let (a, b) = duplex_pair(Side::Initiator, Side::Responder);
    let a_client = a.client();
    let b_server = b.server();
    let _a_loop = a.spawn().expect("spawn a");
    let _b_loop = b.spawn().expect("spawn b");

    let err = a_client
        .send(&vec![1u8; MAX_PAYLOAD + 1])
        .expect_err("oversized payload must fail");
    assert!(matches!(
        err,
        DuplexError::Frame(FrameError::PayloadTooLarge { size, max })
            if size == MAX_PAYLOAD + 1 && max == MAX_PAYLOAD
    ));

    a_client.send(b"ok").expect("later send still works");
    assert_eq!(read_exactly(&b_server, 2), b"ok");
}

#[test]
fn configured_payload_limit_applies_to_writes() {
    let (a, _b) = UnixStream::pair().expect("pair");
    let config = DuplexConfig {
        max_payload_size: 8,
        ..DuplexConfig::default()
    };
    let duplex = Duplex::with_config(a, Side::Initiator, config).expect("duplex");
    assert!(duplex.client().send(b"12345678").is_ok());
    assert!(matches!(
        duplex.client().send(b"123456789"),
        Err(DuplexError::Frame(FrameError::PayloadTooLarge { max: 8, .. }))
    ));
}

#[test]
fn local_close_unblocks_readers_and_fails_writers() {
    let (a, _b) = duplex_pair(Side::Initiator, Side::Responder);
    let client = a.client();
    let server = a.server();
    let handle = a.spawn().expect("spawn");

    let blocked: Vec<_> = [client.clone(), server.clone()]
        .into_iter()
        .map(|endpoint| {
            thread::spawn(move || {
                let mut buf = [0u8; 16];
                endpoint.recv(&mut buf)
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    handle.close();

    for reader in blocked {
        assert_eq!(reader.join().expect("reader thread").expect("eof"), 0);
    }
    assert!(matches!(
        client.send(b"late"),
        Err(DuplexError::Closed(CloseReason::Shutdown))
    ));
    assert_eq!(handle.state(), DuplexState::Closed);
    handle.join().expect("closing locally is clean");
}

#[test]
fn peer_disconnect_is_end_of_stream() {
    let (a, b) = duplex_pair(Side::Initiator, Side::Responder);
    let a_client = a.client();
    let b_server = b.server();
    let b_loop = b.spawn().expect("spawn b");

    a_client.send(b"last words").expect("send");
    drop(a_client);
    drop(a);

    assert_eq!(read_exactly(&b_server, 10), b"last words");
    let mut buf = [0u8; 8];
    assert_eq!(b_server.recv(&mut buf).expect("eof"), 0);
    b_loop.join().expect("peer close is clean");
}

#[test]
fn unknown_prefix_tears_the_connection_down() {
    let (mut raw, conn) = UnixStream::pair().expect("pair");
    let duplex = Duplex::new(conn, Side::Responder).expect("duplex");
    let client = duplex.client();
    let server = duplex.server();
    let handle = duplex.spawn().expect("spawn");

    raw.write_all(&[7, 0, 1, b'x']).expect("raw write");

    let err = handle.join().expect_err("desync must fail the loop");
    assert!(matches!(err, DuplexError::Desync { prefix: 7 }));

    let mut buf = [0u8; 4];
    for endpoint in [&client, &server] {
        assert!(matches!(
            endpoint.recv(&mut buf),
            Err(DuplexError::Closed(CloseReason::Desync { prefix: 7 }))
        ));
    }

    // The connection itself was shut down.
    let mut probe = [0u8; 1];
    assert_eq!(raw.read(&mut probe).expect("raw read after shutdown"), 0);
}

#[test]
fn mismatched_sides_route_into_the_client_endpoint() {
    // Both peers claim to be the initiator. Nothing on the wire can tell,
    // so client traffic arrives at the peer's client endpoint.
    let (a, mut b) = duplex_pair(Side::Initiator, Side::Initiator);
    a.client().send(b"foo").expect("send");

    let header = b.read_header().expect("header");
    assert_eq!(header.prefix, 0);
    b.forward(header.prefix, header.len).expect("forward");
    assert_eq!(b.client().buffered(), 3);
    assert_eq!(b.server().buffered(), 0);
}

#[test]
fn works_over_tcp_loopback() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let acceptor = thread::spawn(move || listener.accept().map(|(stream, _)| stream));

    let dialed = TcpStream::connect(addr).expect("connect");
    let accepted = acceptor.join().expect("acceptor").expect("accept");

    let initiator = Duplex::new(dialed, Side::Initiator).expect("initiator");
    let responder = Duplex::new(accepted, Side::Responder).expect("responder");
    let mut i_server = initiator.server();
    let mut r_client = responder.client();
    let i_loop = initiator.spawn().expect("spawn initiator");
    let r_loop = responder.spawn().expect("spawn responder");

    r_client.write_all(b"over tcp").expect("write");
    let mut buf = [0u8; 8];
    i_server.read_exact(&mut buf).expect("read");
    assert_eq!(&buf, b"over tcp");

    r_loop.close();
    r_loop.join().expect("responder closes cleanly");
    i_loop.join().expect("initiator sees clean eof");
}
