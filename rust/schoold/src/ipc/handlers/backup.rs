use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::core::open_workspace;
use crate::ipc::helpers::Ctx;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn required_path(req: &Request, key: &str) -> Option<String> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn audit(state: &AppState, action: &str, details: serde_json::Value) {
    if let Some(conn) = state.db.as_ref() {
        Ctx {
            conn,
            config: &state.config,
            session: &state.session,
        }
        .audit(action, details);
    }
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(out_path) = required_path(req, "outPath") else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    if let Some(conn) = state.db.as_ref() {
        let _ = conn.execute_batch("PRAGMA wal_checkpoint(FULL)");
    }

    let export = match backup::export_workspace_bundle(&workspace_path, &PathBuf::from(&out_path))
    {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %out_path, error = %e, "backup export failed");
            return err(
                &req.id,
                "backup_failed",
                format!("{e:#}"),
                Some(json!({ "path": out_path })),
            );
        }
    };
    audit(state, "backup.export", json!({ "path": out_path }));

    ok(
        &req.id,
        json!({
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "sha256": export.sha256,
            "entryCount": export.entry_count,
        }),
    )
}

/// Bundle problems come back as `success: false`; only missing params and a
/// missing workspace are protocol errors.
fn handle_backup_restore(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(in_path) = required_path(req, "inPath") else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    // The database file is about to be replaced underneath the connection.
    state.db = None;
    let restored = backup::restore_workspace_bundle(&PathBuf::from(&in_path), &workspace_path);
    let reopened = open_workspace(state, &workspace_path);

    match (restored, reopened) {
        (Ok(summary), Ok(())) => {
            tracing::info!(path = %in_path, "workspace restored from backup");
            audit(state, "backup.restore", json!({ "path": in_path }));
            ok(
                &req.id,
                json!({
                    "success": true,
                    "message": "تمت استعادة النسخة الاحتياطية بنجاح",
                    "bundleFormat": summary.bundle_format,
                    "exportedAt": summary.exported_at,
                }),
            )
        }
        (Err(e), reopened) => {
            tracing::warn!(path = %in_path, error = %e, "backup restore rejected");
            if let Err(open_err) = reopened {
                tracing::warn!(error = %open_err, "failed to reopen workspace after rejected restore");
            }
            ok(
                &req.id,
                json!({ "success": false, "message": format!("{e:#}") }),
            )
        }
        (Ok(_), Err(e)) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.restore" => Some(handle_backup_restore(state, req)),
        _ => None,
    }
}
