// Runtime configuration: compiled-in defaults -> environment variables ->
// `--addr` CLI flag (highest precedence). Constants follow the teacher's
// plain env-var-getter-plus-consts pattern; the CLI layer is new (the
// teacher never parses argv), grounded in `examples/davidakpele-Horizon`'s
// workspace dependency on `clap`.

use std::net::SocketAddr;

use clap::Parser;

const DEFAULT_ADDR: &str = "127.0.0.1:3030";

#[derive(Debug, Parser)]
#[command(name = "game_arcade", about = "Realtime multiplayer arcade server")]
pub struct Cli {
    /// Address to listen on, e.g. 127.0.0.1:3030
    #[arg(long)]
    pub addr: Option<String>,

    /// Emit structured JSON logs instead of the compact human-readable format.
    #[arg(long)]
    pub log_format: Option<String>,
}

/// Resolve the listen address: `--addr` > `ARCADE_ADDR` env var > default.
pub fn listen_addr(cli: &Cli) -> Result<SocketAddr, std::net::AddrParseError> {
    cli.addr
        .clone()
        .or_else(|| std::env::var("ARCADE_ADDR").ok())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string())
        .parse()
}

pub fn log_format_is_json(cli: &Cli) -> bool {
    cli.log_format
        .as_deref()
        .map(|v| v == "json")
        .unwrap_or_else(|| matches!(std::env::var("ARCADE_LOG_FORMAT").as_deref(), Ok("json")))
}
