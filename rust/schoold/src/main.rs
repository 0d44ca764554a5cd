mod ai;
mod backup;
mod calc;
mod cli;
mod config;
mod db;
mod error;
mod gatepass;
mod ipc;
mod links;
mod logging;
mod model;
mod notify;
mod print;
mod store;

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    logging::init_logging(cli.verbosity());

    let config = match config::Config::load_from(cli.config.clone()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let mut state = ipc::AppState::new(config);
    let startup_workspace = cli
        .workspace
        .clone()
        .or_else(|| state.config.workspace.default_path.clone());
    if let Some(path) = startup_workspace {
        // A bad startup workspace leaves the daemon running without one.
        if let Err(e) = ipc::open_workspace(&mut state, &path) {
            tracing::warn!(workspace = %path.display(), error = %e, "startup workspace not opened");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // Recover the id when the envelope is JSON but malformed.
                let id = serde_json::from_str::<serde_json::Value>(&line)
                    .ok()
                    .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string))
                    .unwrap_or_default();
                ipc::err(&id, "bad_json", e.to_string(), None)
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::debug!("stdin closed, exiting");
    ExitCode::SUCCESS
}
