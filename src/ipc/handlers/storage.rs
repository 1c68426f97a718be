use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::backup;
use crate::ipc::helpers::{
    changed, get_confirm, get_required_nonempty, require_admin, with_portal, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::portal::Portal;

fn save(portal: &mut Portal, _params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    portal.save_all()?;
    Ok(json!({ "ok": true }))
}

/// Reports every collection another sidecar changed since the previous
/// `storage.sync`, including changes the router already applied.
fn sync(portal: &mut Portal, _params: &serde_json::Value) -> HandlerResult {
    portal.sync_external()?;
    Ok(changed(portal.take_external_changes()))
}

fn reset(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    portal.reset_to_defaults(get_confirm(params))?;
    Ok(json!({ "ok": true, "isAuthenticated": portal.session().is_authenticated() }))
}

fn backup_export(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    let out_path = get_required_nonempty(params, "outPath")?.trim().to_string();
    let export = backup::export_bundle(portal.store().collections(), &PathBuf::from(&out_path))
        .map_err(|e| HandlerErr {
            code: "backup_failed",
            message: format!("{:#}", e),
            details: Some(json!({ "path": out_path })),
        })?;
    info!(path = %out_path, entries = export.entry_count, "backup exported");
    Ok(json!({
        "ok": true,
        "path": out_path,
        "bundleFormat": export.bundle_format,
        "entryCount": export.entry_count,
    }))
}

/// Restoring replaces all four collections and writes them through.
fn backup_import(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    let in_path = get_required_nonempty(params, "inPath")?.trim().to_string();
    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return Err(HandlerErr {
            code: "not_found",
            message: "bundle file not found".to_string(),
            details: Some(json!({ "path": in_path })),
        });
    }
    let (data, summary) = backup::import_bundle(&src).map_err(|e| HandlerErr {
        code: "backup_failed",
        message: format!("{:#}", e),
        details: Some(json!({ "path": in_path })),
    })?;
    let changes = portal.restore(data)?;
    info!(path = %in_path, ?changes, "backup restored");

    let mut out = changed(changes);
    out["bundleFormatDetected"] = json!(summary.bundle_format_detected);
    out["counts"] = json!({
        "users": summary.users,
        "grades": summary.grades,
        "attendance": summary.attendance,
        "messages": summary.messages,
    });
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "storage.save" => Some(with_portal(state, req, save)),
        "storage.sync" => Some(with_portal(state, req, sync)),
        "storage.reset" => Some(with_portal(state, req, reset)),
        "backup.export" => Some(with_portal(state, req, backup_export)),
        "backup.import" => Some(with_portal(state, req, backup_import)),
        _ => None,
    }
}
