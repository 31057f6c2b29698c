mod auth;
mod config;
mod db;
mod error;
mod grading;
mod ipc;
mod policy;
mod reports;
mod seed;
mod store;

use anyhow::Context;
use std::io::{self, BufRead, Write};

fn init_logging() {
    // stdout carries the protocol, so logs go to stderr.
    let filter = tracing_subscriber::EnvFilter::try_from_env("ROLLBOOK_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let mut config = config::Config::from_env().context("read configuration")?;
    let args: Vec<String> = std::env::args().collect();
    config.apply_args(&args)?;

    let startup_workspace = config.workspace.clone();
    let mut state = ipc::AppState::new(config);
    if let Some(path) = startup_workspace {
        // A bad startup workspace is not fatal; the client can select another.
        if let Err(e) = ipc::open_workspace(&mut state, path.clone()) {
            tracing::error!(workspace = %path.display(), error = %format!("{e:#}"), "startup workspace failed to open");
        }
    }

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
                // No id to echo back.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{resp}");
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
    tracing::debug!("stdin closed, exiting");
    Ok(())
}
