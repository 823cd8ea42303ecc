use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use meshmux_duplex::{Duplex, DuplexConfig, DuplexError, Endpoint, Role, Side};
use meshmux_transport::{Listener, MeshStream};
use tracing::{debug, info};

use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{duplex_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_chunk, Chunk, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const READ_BUFFER: usize = 64 * 1024;

type Received = Result<(Role, u8, Vec<u8>), DuplexError>;

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = DuplexConfig {
        read_timeout: args
            .idle_timeout
            .as_deref()
            .map(parse_duration)
            .transpose()?,
        ..DuplexConfig::default()
    };

    let listener =
        Listener::bind(&args.addr).map_err(|err| transport_error("bind failed", err))?;
    let bound = listener
        .local_addr()
        .map_err(|err| transport_error("bind failed", err))?;
    info!(addr = %bound, "waiting for initiator");

    let stream = listener
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    let peer = stream.peer_label();
    info!(%peer, transport = stream.transport_name(), "initiator connected");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let duplex = Duplex::with_config(stream, Side::Responder, config)
        .map_err(|err| duplex_error("duplex setup failed", err))?;

    let roles: Vec<Role> = match &args.roles {
        Some(roles) => roles.iter().map(|role| role.as_role()).collect(),
        None => Role::ALL.to_vec(),
    };

    let (tx, rx) = mpsc::channel::<Received>();
    for role in roles {
        spawn_reader(duplex.endpoint(role), args.echo, tx.clone())?;
    }
    drop(tx);

    let handle = duplex
        .spawn()
        .map_err(|err| duplex_error("demultiplex start failed", err))?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok((role, prefix, data))) => {
                let chunk = Chunk {
                    role,
                    prefix,
                    data: &data,
                    peer: &peer,
                };
                print_chunk(&chunk, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Ok(Err(err)) => {
                handle.close();
                return Err(duplex_error("receive failed", err));
            }
            Err(RecvTimeoutError::Timeout) => continue,
            // Every reader saw end-of-stream.
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    handle.close();
    handle
        .join()
        .map_err(|err| duplex_error("connection failed", err))?;
    Ok(SUCCESS)
}

fn spawn_reader(
    endpoint: Endpoint<MeshStream>,
    echo: bool,
    tx: mpsc::Sender<Received>,
) -> CliResult<()> {
    let name = format!("meshmux-{}", endpoint.role());
    thread::Builder::new()
        .name(name)
        .spawn(move || forward_chunks(&endpoint, echo, &tx))
        .map(|_| ())
        .map_err(|err| CliError::new(INTERNAL, format!("reader thread failed: {err}")))
}

fn forward_chunks(endpoint: &Endpoint<MeshStream>, echo: bool, tx: &mpsc::Sender<Received>) {
    let mut buf = vec![0u8; READ_BUFFER];
    loop {
        let n = match endpoint.recv(&mut buf) {
            Ok(0) => {
                debug!(role = %endpoint.role(), "endpoint reached end of stream");
                return;
            }
            Ok(n) => n,
            Err(err) => {
                let _ = tx.send(Err(err));
                return;
            }
        };

        if echo {
            if let Err(err) = endpoint.write_chunked(&buf[..n]) {
                let _ = tx.send(Err(err));
                return;
            }
        }

        let chunk = (endpoint.role(), endpoint.prefix(), buf[..n].to_vec());
        if tx.send(Ok(chunk)).is_err() {
            return;
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
