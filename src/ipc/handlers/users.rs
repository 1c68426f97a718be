use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::ipc::helpers::{
    changed, get_confirm, get_optional_str, get_required_nonempty, require_admin, with_portal,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Principal, Role, User};
use crate::portal::Portal;
use crate::store::ChangeSet;

/// Fields accepted by create/update. Everything is optional here; each
/// handler decides what it requires.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserFields {
    id: Option<String>,
    new_id: Option<String>,
    name: Option<String>,
    username: Option<String>,
    #[serde(alias = "password")]
    secret: Option<String>,
    role: Option<String>,
    academic_year: Option<String>,
    level: Option<String>,
    cycle: Option<String>,
    group: Option<String>,
}

fn parse_fields(params: &serde_json::Value) -> Result<UserFields, HandlerErr> {
    serde_json::from_value(params.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid user fields: {}", e)))
}

fn parse_role(raw: Option<&str>) -> Result<Option<Role>, HandlerErr> {
    match raw {
        None => Ok(None),
        Some(r) => Role::parse(r)
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {}", r))),
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn list(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    let role = parse_role(get_optional_str(params, "role").as_deref())?;
    let search = get_optional_str(params, "search")
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let users: Vec<Principal> = portal
        .store()
        .users()
        .iter()
        .filter(|u| role.map(|r| u.role == r).unwrap_or(true))
        .filter(|u| match &search {
            Some(q) => u.name.to_lowercase().contains(q) || u.username.to_lowercase().contains(q),
            None => true,
        })
        .map(Principal::from)
        .collect();
    Ok(json!({ "users": users }))
}

fn create(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    let name = get_required_nonempty(params, "name")?;
    let username = get_required_nonempty(params, "username")?;
    let f = parse_fields(params)?;
    let secret = non_empty(f.secret)
        .ok_or_else(|| HandlerErr::bad_params("missing password"))?;
    let role = parse_role(f.role.as_deref())?.unwrap_or(Role::Student);
    let id = non_empty(f.id).unwrap_or_else(|| Utc::now().timestamp_millis().to_string());

    let user = User {
        id: id.clone(),
        name: name.trim().to_string(),
        username: username.trim().to_string(),
        secret: Some(secret),
        role,
        academic_year: non_empty(f.academic_year),
        level: non_empty(f.level),
        cycle: non_empty(f.cycle),
        group: non_empty(f.group),
    };
    let changes = portal.add_user(user)?;
    let mut out = changed(changes);
    out["userId"] = json!(id);
    Ok(out)
}

/// Patch a user. `newId` rewrites the id (with cascade) before the other
/// fields are applied; an omitted or empty password keeps the stored one.
fn update(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    let id = get_required_nonempty(params, "id")?;
    let f = parse_fields(params)?;
    let role = parse_role(f.role.as_deref())?;

    let Some(mut record) = portal.store().user(&id).cloned() else {
        return Ok(changed(ChangeSet::none()));
    };

    let mut changes = ChangeSet::none();
    if let Some(new_id) = non_empty(f.new_id) {
        if new_id != id {
            changes = portal.update_student_id(&id, &new_id)?;
            record.id = new_id;
        }
    }

    if let Some(v) = non_empty(f.name) {
        record.name = v;
    }
    if let Some(v) = non_empty(f.username) {
        record.username = v;
    }
    if let Some(v) = non_empty(f.secret) {
        record.secret = Some(v);
    }
    if let Some(r) = role {
        record.role = r;
    }
    // Present-but-empty clears an academic field; absent leaves it.
    if let Some(v) = f.academic_year {
        record.academic_year = non_empty(Some(v));
    }
    if let Some(v) = f.level {
        record.level = non_empty(Some(v));
    }
    if let Some(v) = f.cycle {
        record.cycle = non_empty(Some(v));
    }
    if let Some(v) = f.group {
        record.group = non_empty(Some(v));
    }

    let user_id = record.id.clone();
    let mut all = portal.update_user(record)?;
    all.merge(changes);
    let mut out = changed(all);
    out["userId"] = json!(user_id);
    Ok(out)
}

fn delete(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    let id = get_required_nonempty(params, "id")?;
    let changes = portal.delete_user(&id, get_confirm(params))?;
    Ok(changed(changes))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.list" => Some(with_portal(state, req, list)),
        "users.create" => Some(with_portal(state, req, create)),
        "users.update" => Some(with_portal(state, req, update)),
        "users.delete" => Some(with_portal(state, req, delete)),
        _ => None,
    }
}
