//! Accept one TCP connection and print every routing rule the initiator
//! sends on its client stream.
//!
//! Run with:
//!   cargo run --example route-exchange
//!
//! In another terminal:
//!   cargo run --features cli -- rule forward --route-id 1 --format raw > rule.bin
//!   cargo run --features cli -- send tcp://127.0.0.1:7700 --file rule.bin

use std::io::Read;

use meshmux::routing::{Rule, RuleKind, FORWARD_RULE_LEN};
use meshmux::transport::{Listener, TransportAddr};
use meshmux::{Duplex, Side};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr: TransportAddr = "tcp://127.0.0.1:7700".parse()?;
    let listener = Listener::bind(&addr)?;
    eprintln!("Listening on {addr}");

    let stream = listener.accept()?;
    eprintln!("Initiator connected: {}", stream.peer_label());

    let duplex = Duplex::new(stream, Side::Responder)?;
    let mut server = duplex.server();
    let handle = duplex.spawn()?;

    loop {
        // Every record starts with expiry and kind; the kind fixes the length.
        let mut head = [0u8; 9];
        if let Err(err) = server.read_exact(&mut head) {
            eprintln!("Stream ended: {err}");
            break;
        }
        let len = match RuleKind::from_u8(head[8]) {
            Some(kind) => kind.encoded_len(),
            None => FORWARD_RULE_LEN,
        };
        let mut record = head.to_vec();
        record.resize(len, 0);
        server.read_exact(&mut record[9..])?;

        match Rule::try_from(record) {
            Ok(rule) => println!("{rule}"),
            Err(err) => {
                eprintln!("Bad rule: {err}");
                break;
            }
        }
    }

    handle.close();
    handle.join()?;
    Ok(())
}
