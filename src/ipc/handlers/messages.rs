use serde_json::json;

use crate::ipc::helpers::{
    changed, get_confirm, get_optional_str, get_required_nonempty, require_admin,
    require_principal, require_role, with_portal, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Message, MessageDraft, MessageStatus, Principal, Role};
use crate::portal::Portal;
use crate::store::ChangeSet;

/// Admins see everything, teachers what is addressed to their display name,
/// students their own threads.
fn visible_to(p: &Principal, m: &Message) -> bool {
    match p.role {
        Role::Admin => true,
        Role::Teacher => m.teacher_name == p.name,
        Role::Student => m.student_id == p.id,
    }
}

fn list(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    let me = require_principal(portal)?;
    let filter = get_optional_str(params, "filter").unwrap_or_else(|| "all".to_string());
    let wanted: fn(&Message) -> bool = match filter.as_str() {
        "all" => |_| true,
        "unread" => |m| m.status == MessageStatus::Sent,
        "replied" => |m| m.status == MessageStatus::Replied,
        other => {
            return Err(HandlerErr::bad_params(format!(
                "filter must be all, unread or replied (got {})",
                other
            )))
        }
    };

    let mut messages: Vec<&Message> = portal
        .store()
        .messages()
        .iter()
        .filter(|m| visible_to(&me, m) && wanted(m))
        .collect();
    messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
    let unread = messages
        .iter()
        .filter(|m| m.status == MessageStatus::Sent)
        .count();
    Ok(json!({ "messages": messages, "unread": unread }))
}

/// Name snapshots come from the principal and the subject catalog, not
/// from the request.
fn send(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    let me = require_role(portal, &[Role::Student])?;
    let subject_id = get_required_nonempty(params, "subjectId")?;
    let title = get_required_nonempty(params, "title")?;
    let body = get_required_nonempty(params, "body")?;
    let subject = portal
        .store()
        .subject(&subject_id)
        .cloned()
        .ok_or_else(|| HandlerErr::new("not_found", "subject not found"))?;

    let msg = portal.send_message(MessageDraft {
        student_id: me.id,
        student_name: me.name,
        teacher_name: subject.teacher_name,
        subject_id: subject.id,
        subject_name: subject.name,
        title: title.trim().to_string(),
        body: body.trim().to_string(),
    })?;
    Ok(json!({ "message": msg }))
}

/// Viewing a message as staff marks it read.
fn open(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    let me = require_principal(portal)?;
    let id = get_required_nonempty(params, "messageId")?;
    let msg = portal
        .store()
        .message(&id)
        .filter(|m| visible_to(&me, m))
        .cloned()
        .ok_or_else(|| HandlerErr::new("not_found", "message not found"))?;

    if me.role != Role::Student && msg.status == MessageStatus::Sent {
        portal.mark_as_read(&id)?;
    }
    Ok(json!({ "message": portal.store().message(&id) }))
}

fn mark_read(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    let me = require_role(portal, &[Role::Admin, Role::Teacher])?;
    let id = get_required_nonempty(params, "messageId")?;
    let visible = portal
        .store()
        .message(&id)
        .map(|m| visible_to(&me, m));
    match visible {
        None => Ok(changed(ChangeSet::none())),
        Some(false) => Err(HandlerErr::new("forbidden", "message is addressed to someone else")),
        Some(true) => Ok(changed(portal.mark_as_read(&id)?)),
    }
}

/// Only the addressed teacher or an admin may answer.
fn reply(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    let me = require_role(portal, &[Role::Admin, Role::Teacher])?;
    let id = get_required_nonempty(params, "messageId")?;
    let response = get_required_nonempty(params, "response")?;
    let visible = portal
        .store()
        .message(&id)
        .map(|m| visible_to(&me, m));
    match visible {
        None => Ok(changed(ChangeSet::none())),
        Some(false) => Err(HandlerErr::new("forbidden", "message is addressed to someone else")),
        Some(true) => {
            let changes = portal.reply_message(&id, response.trim())?;
            let mut out = changed(changes);
            out["message"] = json!(portal.store().message(&id));
            Ok(out)
        }
    }
}

fn delete(portal: &mut Portal, params: &serde_json::Value) -> HandlerResult {
    require_admin(portal)?;
    let id = get_required_nonempty(params, "messageId")?;
    let changes = portal.delete_message(&id, get_confirm(params))?;
    Ok(changed(changes))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "messages.list" => Some(with_portal(state, req, list)),
        "messages.send" => Some(with_portal(state, req, send)),
        "messages.open" => Some(with_portal(state, req, open)),
        "messages.markRead" => Some(with_portal(state, req, mark_read)),
        "messages.reply" => Some(with_portal(state, req, reply)),
        "messages.delete" => Some(with_portal(state, req, delete)),
        _ => None,
    }
}
