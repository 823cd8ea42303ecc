use std::time::SystemTime;

use meshmux_routing::Rule;
use uuid::Uuid;

use crate::cmd::{parse_duration, RuleArgs, RuleCommand};
use crate::exit::{rule_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_rule, OutputFormat};

pub fn run(args: RuleArgs, format: OutputFormat) -> CliResult<i32> {
    let rule = match args.command {
        RuleCommand::App(app) => {
            let expire_at = SystemTime::now() + parse_duration(&app.ttl)?;
            Rule::app(
                expire_at,
                app.route_id,
                app.remote_pk,
                app.remote_port,
                app.local_port,
            )
        }
        RuleCommand::Forward(fwd) => {
            let expire_at = SystemTime::now() + parse_duration(&fwd.ttl)?;
            let transport_id = fwd.transport_id.unwrap_or_else(Uuid::new_v4);
            Rule::forward(expire_at, fwd.route_id, transport_id)
        }
        RuleCommand::Decode(decode) => {
            let raw = decode_hex(&decode.hex)?;
            Rule::try_from(raw).map_err(|err| rule_error("decode failed", err))?
        }
    };

    print_rule(&rule, format);
    Ok(SUCCESS)
}

fn decode_hex(input: &str) -> CliResult<Vec<u8>> {
    let input = input.trim();
    let input = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(input)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid rule hex: {err}")))
}
