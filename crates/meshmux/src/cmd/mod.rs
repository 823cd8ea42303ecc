use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use meshmux_duplex::Role;
use meshmux_routing::{PublicKey, RouteId};
use meshmux_transport::TransportAddr;
use uuid::Uuid;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod rule;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept one connection as the responder and print what arrives.
    Listen(ListenArgs),
    /// Connect as the initiator and send one payload on a role.
    Send(SendArgs),
    /// Encode or decode a routing rule record.
    Rule(RuleArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Rule(args) => rule::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Client,
    Server,
}

impl RoleArg {
    pub fn as_role(self) -> Role {
        match self {
            RoleArg::Client => Role::Client,
            RoleArg::Server => Role::Server,
        }
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (tcp://host:port or unix:///path).
    pub addr: TransportAddr,
    /// Only print data arriving on these roles (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub roles: Option<Vec<RoleArg>>,
    /// Write every received chunk back on the endpoint it arrived on.
    #[arg(long)]
    pub echo: bool,
    /// Exit after printing N chunks.
    #[arg(long)]
    pub count: Option<usize>,
    /// Close the connection after this long without traffic (e.g. 30s).
    #[arg(long)]
    pub idle_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to (tcp://host:port or unix:///path).
    pub addr: TransportAddr,
    /// Logical stream to send on.
    #[arg(long, short = 'r', value_enum, default_value = "client")]
    pub role: RoleArg,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Wait for one response chunk on the same role and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for a response when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct RuleArgs {
    #[command(subcommand)]
    pub command: RuleCommand,
}

#[derive(Subcommand, Debug)]
pub enum RuleCommand {
    /// Build a rule delivering a route to a local application port.
    App(AppRuleArgs),
    /// Build a rule forwarding a route over another transport.
    Forward(ForwardRuleArgs),
    /// Decode a hex-encoded rule record.
    Decode(DecodeRuleArgs),
}

#[derive(Args, Debug)]
pub struct AppRuleArgs {
    #[arg(long)]
    pub route_id: RouteId,
    /// Remote node public key (66 hex characters).
    #[arg(long)]
    pub remote_pk: PublicKey,
    #[arg(long)]
    pub remote_port: u16,
    #[arg(long)]
    pub local_port: u16,
    /// Lifetime of the rule (e.g. 120s, 2m).
    #[arg(long, default_value = "2m")]
    pub ttl: String,
}

#[derive(Args, Debug)]
pub struct ForwardRuleArgs {
    #[arg(long)]
    pub route_id: RouteId,
    /// Transport to forward over. A random id is generated when omitted.
    #[arg(long)]
    pub transport_id: Option<Uuid>,
    /// Lifetime of the rule (e.g. 120s, 2m).
    #[arg(long, default_value = "2m")]
    pub ttl: String,
}

#[derive(Args, Debug)]
pub struct DecodeRuleArgs {
    /// Hex-encoded rule bytes.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => Ok(Duration::from_secs(value)),
    }
}
