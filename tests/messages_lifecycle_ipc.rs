mod test_support;

use serde_json::json;
use test_support::{changed_keys, spawn_sidecar, temp_workspace};

fn ids(list: &serde_json::Value) -> Vec<String> {
    list.get("messages")
        .and_then(|v| v.as_array())
        .expect("messages")
        .iter()
        .filter_map(|m| m.get("id").and_then(|v| v.as_str()).map(|s| s.to_string()))
        .collect()
}

#[test]
fn student_question_is_read_and_answered_by_the_subject_teacher() {
    let workspace = temp_workspace("iesportal-messages-lifecycle");
    let mut s = spawn_sidecar();
    s.select(&workspace);

    s.login("1209362", "elgh2810");
    let mine = s.request_ok("messages.list", json!({}));
    assert_eq!(ids(&mine), vec!["msg2"]);

    let sent = s.request_ok(
        "messages.send",
        json!({ "subjectId": "sub1", "title": "  Práctica 4 ", "body": "¿Hay que entregar el script?" }),
    );
    let msg = sent.get("message").expect("message");
    let msg_id = msg.get("id").and_then(|v| v.as_str()).expect("id").to_string();
    assert_eq!(msg.get("status").and_then(|v| v.as_str()), Some("sent"));
    assert_eq!(msg.get("title").and_then(|v| v.as_str()), Some("Práctica 4"));
    assert_eq!(msg.get("teacherName").and_then(|v| v.as_str()), Some("Ana García"));
    assert_eq!(
        msg.get("studentName").and_then(|v| v.as_str()),
        Some("Walid Taibi El Ghoufairi")
    );

    // Newest first.
    let mine = s.request_ok("messages.list", json!({}));
    assert_eq!(ids(&mine), vec![msg_id.clone(), "msg2".to_string()]);

    assert_eq!(
        s.request_err(
            "messages.send",
            json!({ "subjectId": "sub99", "title": "x", "body": "y" })
        ),
        "not_found"
    );
    assert_eq!(
        s.request_err(
            "messages.send",
            json!({ "subjectId": "sub1", "title": "   ", "body": "y" })
        ),
        "bad_params"
    );
    assert_eq!(
        s.request_err("messages.reply", json!({ "messageId": msg_id, "response": "x" })),
        "forbidden"
    );
    // A student opening their own message does not mark it read.
    let opened = s.request_ok("messages.open", json!({ "messageId": msg_id }));
    assert_eq!(opened.pointer("/message/status").and_then(|v| v.as_str()), Some("sent"));
    assert_eq!(
        s.request_err("messages.open", json!({ "messageId": "msg1" })),
        "not_found"
    );
    s.request_ok("auth.logout", json!({}));

    s.login("ana.garcia", "ana123");
    let inbox = s.request_ok("messages.list", json!({ "filter": "unread" }));
    assert_eq!(ids(&inbox), vec![msg_id.clone()]);
    assert_eq!(inbox.get("unread").and_then(|v| v.as_u64()), Some(1));
    let replied = s.request_ok("messages.list", json!({ "filter": "replied" }));
    assert_eq!(ids(&replied), vec!["msg1"]);

    let opened = s.request_ok("messages.open", json!({ "messageId": msg_id }));
    assert_eq!(opened.pointer("/message/status").and_then(|v| v.as_str()), Some("read"));
    let inbox = s.request_ok("messages.list", json!({ "filter": "unread" }));
    assert!(ids(&inbox).is_empty());

    // msg2 belongs to another teacher.
    assert_eq!(
        s.request_err("messages.reply", json!({ "messageId": "msg2", "response": "x" })),
        "forbidden"
    );
    assert_eq!(
        s.request_err("messages.reply", json!({ "messageId": msg_id, "response": "  " })),
        "bad_params"
    );
    let res = s.request_ok(
        "messages.reply",
        json!({ "messageId": msg_id, "response": "Sí, junto con la memoria." }),
    );
    assert_eq!(changed_keys(&res), vec!["ies_messages"]);
    assert_eq!(res.pointer("/message/status").and_then(|v| v.as_str()), Some("replied"));
    assert!(res.pointer("/message/repliedAt").and_then(|v| v.as_str()).is_some());

    let missing = s.request_ok(
        "messages.reply",
        json!({ "messageId": "nope", "response": "x" }),
    );
    assert_eq!(missing.get("changed").and_then(|v| v.as_bool()), Some(false));
    s.request_ok("auth.logout", json!({}));

    s.login("1209362", "elgh2810");
    let opened = s.request_ok("messages.open", json!({ "messageId": msg_id }));
    assert_eq!(
        opened.pointer("/message/response").and_then(|v| v.as_str()),
        Some("Sí, junto con la memoria.")
    );

    drop(s);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn mark_read_only_moves_sent_messages_and_delete_needs_confirm() {
    let workspace = temp_workspace("iesportal-messages-admin");
    let mut s = spawn_sidecar();
    s.select(&workspace);
    s.login("admin", "admin123");

    let all = s.request_ok("messages.list", json!({ "filter": "all" }));
    assert_eq!(ids(&all), vec!["msg2", "msg1"]);
    assert_eq!(
        s.request_err("messages.list", json!({ "filter": "starred" })),
        "bad_params"
    );

    // msg1 is already replied; marking it read is a no-op.
    let noop = s.request_ok("messages.markRead", json!({ "messageId": "msg1" }));
    assert_eq!(noop.get("changed").and_then(|v| v.as_bool()), Some(false));
    let res = s.request_ok("messages.markRead", json!({ "messageId": "msg2" }));
    assert_eq!(changed_keys(&res), vec!["ies_messages"]);
    let again = s.request_ok("messages.markRead", json!({ "messageId": "msg2" }));
    assert_eq!(again.get("changed").and_then(|v| v.as_bool()), Some(false));

    assert_eq!(
        s.request_err("messages.delete", json!({ "messageId": "msg2" })),
        "confirmation_required"
    );
    let del = s.request_ok(
        "messages.delete",
        json!({ "messageId": "msg2", "confirm": true }),
    );
    assert_eq!(changed_keys(&del), vec!["ies_messages"]);
    let all = s.request_ok("messages.list", json!({}));
    assert_eq!(ids(&all), vec!["msg1"]);

    // Only students write messages.
    assert_eq!(
        s.request_err(
            "messages.send",
            json!({ "subjectId": "sub1", "title": "x", "body": "y" })
        ),
        "forbidden"
    );

    drop(s);
    let _ = std::fs::remove_dir_all(workspace);
}
