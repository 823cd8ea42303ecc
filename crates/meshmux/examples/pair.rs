//! Two multiplexers over one Unix socket pair, exchanging data on both roles.
//!
//! Run with:
//!   cargo run --example pair

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use meshmux::{Duplex, Side};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (a, b) = UnixStream::pair()?;
    let initiator = Duplex::new(a, Side::Initiator)?;
    let responder = Duplex::new(b, Side::Responder)?;

    let mut i_client = initiator.client();
    let mut i_server = initiator.server();
    let mut r_client = responder.client();
    let mut r_server = responder.server();

    let i_loop = initiator.spawn()?;
    let r_loop = responder.spawn()?;

    i_client.write_all(b"request from initiator")?;
    r_client.write_all(b"request from responder")?;

    let mut buf = [0u8; 22];
    r_server.read_exact(&mut buf)?;
    eprintln!("responder server got: {}", String::from_utf8_lossy(&buf));
    i_server.read_exact(&mut buf)?;
    eprintln!("initiator server got: {}", String::from_utf8_lossy(&buf));

    i_loop.close();
    i_loop.join()?;
    r_loop.join()?;
    Ok(())
}
