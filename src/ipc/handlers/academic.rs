use serde_json::json;

use crate::ipc::helpers::{
    changed, get_optional_f64, get_optional_i64, get_required_nonempty, require_admin,
    require_admin_or_self, with_portal, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Semester;
use crate::portal::Portal;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

fn subjects_list(portal: &mut Portal, _params: &serde_json::Value) -> HandlerResult {
    Ok(json!({ "subjects": portal.store().subjects() }))
}

fn grades_list(portal: &mut Portal, _params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    Ok(json!({ "grades": portal.store().grades() }))
}

/// Scores are clamped into [0, 10] here; the store trusts its callers.
fn grades_update(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    let student_id = get_required_nonempty(params, "studentId")?;
    let subject_id = get_required_nonempty(params, "subjectId")?;
    let semester = get_optional_i64(params, "semester")?
        .and_then(Semester::from_number)
        .ok_or_else(|| HandlerErr::bad_params("semester must be 1 or 2"))?;
    let score = get_optional_f64(params, "score")?.map(|s| s.clamp(MIN_SCORE, MAX_SCORE));

    let changes = portal.update_grade(&student_id, &subject_id, semester, score)?;
    let mut out = changed(changes);
    out["score"] = json!(score);
    Ok(out)
}

fn attendance_list(portal: &mut Portal, _params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    Ok(json!({ "attendance": portal.store().attendance() }))
}

/// Absences below zero become zero; justified hours are capped at absences.
fn attendance_update(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    let student_id = get_required_nonempty(params, "studentId")?;
    let subject_id = get_required_nonempty(params, "subjectId")?;
    let absences = get_optional_i64(params, "absences")?
        .ok_or_else(|| HandlerErr::bad_params("missing absences"))?
        .clamp(0, u32::MAX as i64) as u32;
    let justified = get_optional_i64(params, "justified")?
        .map(|j| j.clamp(0, absences as i64) as u32);

    let changes = portal.update_attendance(&student_id, &subject_id, absences, justified)?;
    let mut out = changed(changes);
    out["absences"] = json!(absences);
    out["justified"] = json!(justified);
    Ok(out)
}

fn student_data(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    let student_id = get_required_nonempty(params, "studentId")?;
    require_admin_or_self(portal, &student_id)?;
    Ok(json!(portal.store().student_data(&student_id)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(with_portal(state, req, subjects_list)),
        "grades.list" => Some(with_portal(state, req, grades_list)),
        "grades.update" => Some(with_portal(state, req, grades_update)),
        "attendance.list" => Some(with_portal(state, req, attendance_list)),
        "attendance.update" => Some(with_portal(state, req, attendance_update)),
        "students.data" => Some(with_portal(state, req, student_data)),
        _ => None,
    }
}
