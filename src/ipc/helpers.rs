use serde_json::json;

use crate::error::PortalError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Principal, Role};
use crate::portal::Portal;
use crate::store::ChangeSet;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<PortalError> for HandlerErr {
    fn from(e: PortalError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerErr>;

/// Run `f` against the attached portal and wrap its outcome in the IPC envelope.
pub fn with_portal<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&mut Portal, &serde_json::Value) -> HandlerResult,
{
    let Some(portal) = state.portal.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(portal, &req.params) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn require_principal(portal: &Portal) -> Result<Principal, HandlerErr> {
    portal
        .session()
        .principal()
        .cloned()
        .ok_or_else(|| HandlerErr::new("not_authenticated", "log in first"))
}

pub fn require_role(portal: &Portal, roles: &[Role]) -> Result<Principal, HandlerErr> {
    let p = require_principal(portal)?;
    if !roles.contains(&p.role) {
        return Err(HandlerErr::new(
            "forbidden",
            format!("not allowed for role {:?}", p.role).to_lowercase(),
        ));
    }
    Ok(p)
}

pub fn require_admin(portal: &Portal) -> Result<Principal, HandlerErr> {
    require_role(portal, &[Role::Admin])
}

/// Admins may read any student; a student only themselves.
pub fn require_admin_or_self(portal: &Portal, student_id: &str) -> Result<Principal, HandlerErr> {
    let p = require_principal(portal)?;
    match p.role {
        Role::Admin => Ok(p),
        Role::Student if p.id == student_id => Ok(p),
        _ => Err(HandlerErr::new("forbidden", "not allowed to read this student")),
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_nonempty(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let v = get_required_str(params, key)?;
    if v.trim().is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(v)
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_confirm(params: &serde_json::Value) -> bool {
    params
        .get("confirm")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Absent or null means "no value"; anything else must be a finite number
/// (numeric strings are accepted, as form inputs send them).
pub fn get_optional_f64(params: &serde_json::Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    let parsed = match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) if s.trim().is_empty() => return Ok(None),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(x) if x.is_finite() => Ok(Some(x)),
        _ => Err(HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}

pub fn get_optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    v.as_i64()
        .map(Some)
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key)))
}

pub fn changed(changes: ChangeSet) -> serde_json::Value {
    let keys: Vec<&str> = changes.iter().map(|c| c.key()).collect();
    json!({
        "changed": !changes.is_empty(),
        "collections": keys,
    })
}
