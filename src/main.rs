mod admission;
mod assets;
mod config;
mod db;
mod ipc;
mod store;
#[cfg(test)]
mod test_support;

use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    // stdout carries responses; logs go to stderr.
    let filter =
        EnvFilter::try_from_env("ADMISSIOND_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let _ = dotenvy::dotenv();
    let args = config::Args::parse();
    init_tracing();

    let mut state = ipc::AppState::new(args.settings());
    if let Some(path) = args.workspace.clone() {
        if let Err(e) = state.open_workspace(path.clone()) {
            error!(
                workspace = %path.to_string_lossy(),
                error = ?e,
                "startup workspace failed to open"
            );
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "admissiond ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; answer with an empty one.
                let _ = writeln!(stdout, "{}", ipc::err("", "bad_json", e.to_string(), None));
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("stdin closed; shutting down");
}
