use crate::ipc::helpers::{get_required_str, with_portal, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::portal::Portal;
use serde_json::json;

fn session_json(portal: &Portal) -> serde_json::Value {
    let s = portal.session();
    json!({
        "principal": s.principal(),
        "isAuthenticated": s.is_authenticated(),
        "isAdmin": s.is_admin(),
        "homeView": s.home_view(),
    })
}

fn login(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    let username = get_required_str(params, "username")?;
    // Older clients send the credential as `password`.
    let secret = match get_required_str(params, "secret") {
        Ok(s) => s,
        Err(_) => get_required_str(params, "password")?,
    };
    if portal.login(&username, &secret) {
        let mut out = session_json(portal);
        out["ok"] = json!(true);
        Ok(out)
    } else {
        Ok(json!({
            "ok": false,
            "message": "invalid username or password",
        }))
    }
}

fn logout(portal: &mut Portal, _params: &serde_json::Value) -> HandlerResult {
    portal.logout();
    Ok(session_json(portal))
}

fn session(portal: &mut Portal, _params: &serde_json::Value) -> HandlerResult {
    Ok(session_json(portal))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(with_portal(state, req, login)),
        "auth.logout" => Some(with_portal(state, req, logout)),
        "auth.session" => Some(with_portal(state, req, session)),
        _ => None,
    }
}
