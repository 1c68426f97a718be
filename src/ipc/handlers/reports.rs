use serde_json::json;

use crate::calc::{self, Metric};
use crate::ipc::helpers::{
    get_optional_str, require_admin, require_admin_or_self, require_principal, with_portal,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::portal::Portal;

/// Grade report for one student. Students get their own report when no
/// `studentId` is given.
fn student_report(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    let me = require_principal(portal)?;
    let student_id = get_optional_str(params, "studentId").unwrap_or(me.id);
    require_admin_or_self(portal, &student_id)?;
    let view = match get_optional_str(params, "view") {
        None => Metric::Final,
        Some(v) => Metric::parse(&v)
            .ok_or_else(|| HandlerErr::bad_params("view must be s1, s2 or summary"))?,
    };

    let store = portal.store();
    let report = calc::student_report(
        store.grades(),
        store.attendance(),
        store.subjects(),
        &student_id,
        view,
        portal.config().reports.absence_warning_hours,
    );
    Ok(json!(report))
}

fn dashboard(portal: &mut Portal, _params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    let store = portal.store();
    Ok(json!(calc::dashboard(
        store.users(),
        store.subjects(),
        store.grades(),
        store.messages(),
    )))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.student" => Some(with_portal(state, req, student_report)),
        "reports.dashboard" => Some(with_portal(state, req, dashboard)),
        _ => None,
    }
}
