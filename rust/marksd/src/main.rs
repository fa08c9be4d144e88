mod backend;
mod config;
mod error;
mod ipc;
mod logger;
mod marks;
mod rules;

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "marksd", version)]
#[command(about = "Marks rule engine sidecar speaking line-delimited JSON on stdin/stdout")]
struct Cli {
    /// Engine configuration file (TOML).
    #[arg(long, env = "MARKSD_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, short)]
    verbose: bool,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<config::EngineConfig> {
    let Some(path) = path else {
        return Ok(config::EngineConfig::default());
    };
    let cfg = config::EngineConfig::load(path)?;
    tracing::info!(path = %path.display(), "loaded engine config");
    Ok(cfg)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let cfg = load_config(cli.config.as_ref())?;
    let mut state = ipc::AppState::new(cfg);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "marksd ready");

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "malformed request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(stdout, "{}", resp);
        let _ = stdout.flush();
    }

    tracing::info!("marksd exiting");
    Ok(())
}
