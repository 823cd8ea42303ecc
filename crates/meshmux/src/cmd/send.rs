use std::fs;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use meshmux_duplex::{Duplex, Endpoint, Side};
use meshmux_transport::{connect, MeshStream};
use tracing::debug;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{
    duplex_error, io_error, transport_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS,
    TIMEOUT, USAGE,
};
use crate::output::{print_chunk, Chunk, OutputFormat};

const RESPONSE_BUFFER: usize = 64 * 1024;

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let stream = connect(&args.addr).map_err(|err| transport_error("connect failed", err))?;
    let peer = stream.peer_label();
    let duplex = Duplex::new(stream, Side::Initiator)
        .map_err(|err| duplex_error("duplex setup failed", err))?;
    let endpoint = duplex.endpoint(args.role.as_role());
    let handle = duplex
        .spawn()
        .map_err(|err| duplex_error("demultiplex start failed", err))?;

    let sent = endpoint
        .write_chunked(&payload)
        .map_err(|err| duplex_error("send failed", err))?;
    debug!(role = %endpoint.role(), bytes = sent, "payload sent");

    if args.wait {
        let data = wait_for_response(endpoint.clone(), wait_timeout)?;
        let chunk = Chunk {
            role: endpoint.role(),
            prefix: endpoint.prefix(),
            data: &data,
            peer: &peer,
        };
        print_chunk(&chunk, format);
    }

    handle.close();
    handle
        .join()
        .map_err(|err| duplex_error("connection failed", err))?;
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

trait ResponseSource: Send + 'static {
    fn read_response(&self, buf: &mut [u8]) -> meshmux_duplex::Result<usize>;
}

impl ResponseSource for Endpoint<MeshStream> {
    fn read_response(&self, buf: &mut [u8]) -> meshmux_duplex::Result<usize> {
        self.recv(buf)
    }
}

/// Read one chunk from `source`, giving up after `timeout`.
fn wait_for_response<S: ResponseSource>(source: S, timeout: Duration) -> CliResult<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("meshmux-wait".to_string())
        .spawn(move || {
            let mut buf = vec![0u8; RESPONSE_BUFFER];
            let result = source.read_response(&mut buf).map(|n| {
                buf.truncate(n);
                buf
            });
            let _ = tx.send(result);
        })
        .map_err(|err| CliError::new(INTERNAL, format!("wait thread failed: {err}")))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(data)) if data.is_empty() => Err(CliError::new(
            FAILURE,
            "receive failed: peer closed before responding",
        )),
        Ok(Ok(data)) => Ok(data),
        Ok(Err(err)) => Err(duplex_error("receive failed", err)),
        Err(RecvTimeoutError::Timeout) => Err(CliError::new(
            TIMEOUT,
            format!("no response within {timeout:?}"),
        )),
        Err(RecvTimeoutError::Disconnected) => {
            Err(CliError::new(INTERNAL, "wait thread exited without a result"))
        }
    }
}
