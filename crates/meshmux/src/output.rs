use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use meshmux_duplex::Role;
use meshmux_routing::{Rule, RuleKind};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One run of bytes read from an endpoint.
pub struct Chunk<'a> {
    pub role: Role,
    pub prefix: u8,
    pub data: &'a [u8],
    pub peer: &'a str,
}

#[derive(Serialize)]
struct ChunkOutput<'a> {
    role: &'a str,
    prefix: u8,
    payload_size: usize,
    payload: String,
    peer: &'a str,
    timestamp: String,
}

pub fn print_chunk(chunk: &Chunk<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ChunkOutput {
                role: chunk.role.as_str(),
                prefix: chunk.prefix,
                payload_size: chunk.data.len(),
                payload: payload_preview(chunk.data),
                peer: chunk.peer,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ROLE", "PREFIX", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    chunk.role.to_string(),
                    chunk.prefix.to_string(),
                    chunk.data.len().to_string(),
                    chunk.peer.to_string(),
                    payload_preview(chunk.data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "role={} prefix={} size={} peer={} payload={}",
                chunk.role,
                chunk.prefix,
                chunk.data.len(),
                chunk.peer,
                payload_preview(chunk.data)
            );
        }
        OutputFormat::Raw => print_raw(chunk.data),
    }
}

#[derive(Serialize)]
struct RuleOutput {
    kind: String,
    route_id: u32,
    expire_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_pk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transport_id: Option<String>,
    encoded: String,
}

impl From<&Rule> for RuleOutput {
    fn from(rule: &Rule) -> Self {
        Self {
            kind: rule.kind().to_string(),
            route_id: rule.route_id(),
            expire_at: rule.expiry_secs(),
            remote_pk: rule.remote_pk().map(|pk| pk.to_string()),
            remote_port: rule.remote_port(),
            local_port: rule.local_port(),
            transport_id: rule.transport_id().map(|id| id.to_string()),
            encoded: hex::encode(rule.as_bytes()),
        }
    }
}

pub fn print_rule(rule: &Rule, format: OutputFormat) {
    let out = RuleOutput::from(rule);
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            table.add_row(vec!["kind".to_string(), out.kind.clone()]);
            table.add_row(vec!["route_id".to_string(), out.route_id.to_string()]);
            table.add_row(vec!["expire_at".to_string(), out.expire_at.to_string()]);
            if rule.kind() == RuleKind::App {
                table.add_row(vec![
                    "remote".to_string(),
                    format!(
                        "{}:{}",
                        out.remote_pk.clone().unwrap_or_default(),
                        out.remote_port.unwrap_or_default()
                    ),
                ]);
                table.add_row(vec![
                    "local_port".to_string(),
                    out.local_port.unwrap_or_default().to_string(),
                ]);
            } else {
                table.add_row(vec![
                    "transport_id".to_string(),
                    out.transport_id.clone().unwrap_or_default(),
                ]);
            }
            table.add_row(vec!["encoded".to_string(), out.encoded.clone()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{rule}"),
        OutputFormat::Raw => print_raw(rule.as_bytes()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
