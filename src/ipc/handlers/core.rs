use crate::db;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{optional_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::seed::{self, SeedPasswords};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "signedInAs": state.identity,
        }),
    )
}

/// Opens (creating if needed) the workspace database. Any signed-in identity
/// belonged to the previous workspace and is dropped.
pub fn open_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<()> {
    let conn = db::open_db(&path)?;
    tracing::info!(workspace = %path.display(), "workspace opened");
    state.workspace = Some(path);
    state.db = Some(conn);
    state.identity = None;
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, path.clone()) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            tracing::warn!(workspace = %path.display(), error = %e, "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

fn handle_workspace_bootstrap(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let seed_cfg = &state.config.seed;
    let run = || -> Result<serde_json::Value, HandlerErr> {
        let pick = |key: &str, fallback: &Option<String>| -> Result<Option<String>, HandlerErr> {
            Ok(optional_str(&req.params, key)?.or_else(|| fallback.clone()))
        };
        let passwords = SeedPasswords {
            principal: pick("principalPassword", &seed_cfg.principal_password)?,
            teacher: pick("teacherPassword", &seed_cfg.teacher_password)?,
            student: pick("studentPassword", &seed_cfg.student_password)?,
        };
        to_json(&seed::bootstrap(conn, &passwords)?)
    };
    match run() {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "workspace.bootstrap" => Some(handle_workspace_bootstrap(state, req)),
        _ => None,
    }
}
