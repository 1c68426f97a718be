mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, temp_workspace};

#[test]
fn admin_edits_reach_a_student_logged_in_elsewhere() {
    let workspace = temp_workspace("iesportal-session-sync");
    let mut admin = spawn_sidecar();
    let mut student = spawn_sidecar();
    admin.select(&workspace);
    student.select(&workspace);

    student.login("2984619", "elgh2305");
    admin.login("admin", "admin123");

    let _ = admin.request_ok(
        "users.update",
        json!({ "id": "2984619", "group": "2º DAM", "name": "Imad E. G." }),
    );

    let session = student.request_ok("auth.session", json!({}));
    assert_eq!(
        session.pointer("/principal/group").and_then(|v| v.as_str()),
        Some("2º DAM")
    );
    assert_eq!(
        session.pointer("/principal/name").and_then(|v| v.as_str()),
        Some("Imad E. G.")
    );
    assert_eq!(session.get("homeView").and_then(|v| v.as_str()), Some("student/summary"));

    // Clearing an academic field propagates as well.
    let _ = admin.request_ok("users.update", json!({ "id": "2984619", "group": "" }));
    let session = student.request_ok("auth.session", json!({}));
    assert!(session.pointer("/principal/group").is_none());

    // Deleting the record elsewhere leaves the session in place.
    let _ = admin.request_ok("users.delete", json!({ "id": "2984619", "confirm": true }));
    let session = student.request_ok("auth.session", json!({}));
    assert_eq!(session.get("isAuthenticated").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        session.pointer("/principal/id").and_then(|v| v.as_str()),
        Some("2984619")
    );

    drop(admin);
    drop(student);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn own_id_rewrite_keeps_the_admin_session() {
    let workspace = temp_workspace("iesportal-session-rename");
    let mut s = spawn_sidecar();
    s.select(&workspace);
    s.login("admin", "admin123");

    let _ = s.request_ok("users.update", json!({ "id": "admin1", "newId": "root" }));
    let session = s.request_ok("auth.session", json!({}));
    assert_eq!(session.pointer("/principal/id").and_then(|v| v.as_str()), Some("root"));
    assert_eq!(session.get("isAdmin").and_then(|v| v.as_bool()), Some(true));

    // Demoting yourself takes effect immediately.
    let _ = s.request_ok("users.update", json!({ "id": "root", "role": "teacher" }));
    let session = s.request_ok("auth.session", json!({}));
    assert_eq!(session.get("isAdmin").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(session.get("homeView").and_then(|v| v.as_str()), Some("teacher"));
    assert_eq!(s.request_err("users.list", json!({})), "forbidden");

    drop(s);
    let _ = std::fs::remove_dir_all(workspace);
}
