mod test_support;

use serde_json::json;
use test_support::{changed_keys, spawn_sidecar, temp_workspace};

fn grade_s2(list: &serde_json::Value, student_id: &str, subject_id: &str) -> Option<f64> {
    list.get("grades")
        .and_then(|v| v.as_array())
        .and_then(|a| {
            a.iter().find(|g| {
                g.get("studentId").and_then(|v| v.as_str()) == Some(student_id)
                    && g.get("subjectId").and_then(|v| v.as_str()) == Some(subject_id)
            })
        })
        .and_then(|g| g.get("semester2"))
        .and_then(|v| v.as_f64())
}

#[test]
fn two_sidecars_on_one_workspace_converge() {
    let workspace = temp_workspace("iesportal-cross-context");
    let mut a = spawn_sidecar();
    let mut b = spawn_sidecar();
    a.select(&workspace);
    b.select(&workspace);
    a.login("admin", "admin123");
    b.login("admin", "admin123");

    let _ = a.request_ok(
        "grades.update",
        json!({ "studentId": "1209362", "subjectId": "sub1", "semester": 2, "score": 9 }),
    );
    // The router polls before every request, so b already sees a's write.
    let grades = b.request_ok("grades.list", json!({}));
    assert_eq!(grade_s2(&grades, "1209362", "sub1"), Some(9.0));

    // Last writer wins.
    let _ = b.request_ok(
        "grades.update",
        json!({ "studentId": "1209362", "subjectId": "sub1", "semester": 2, "score": 4 }),
    );
    let _ = a.request_ok(
        "grades.update",
        json!({ "studentId": "1209362", "subjectId": "sub1", "semester": 2, "score": 6.5 }),
    );
    let ga = a.request_ok("grades.list", json!({}));
    let gb = b.request_ok("grades.list", json!({}));
    assert_eq!(ga, gb);
    assert_eq!(grade_s2(&gb, "1209362", "sub1"), Some(6.5));

    // Changes applied before earlier requests are still reported once.
    let synced = b.request_ok("storage.sync", json!({}));
    assert_eq!(changed_keys(&synced), vec!["ies_grades"]);
    let synced = b.request_ok("storage.sync", json!({}));
    assert!(changed_keys(&synced).is_empty());
    assert_eq!(synced.get("changed").and_then(|v| v.as_bool()), Some(false));

    let _ = a.request_ok(
        "attendance.update",
        json!({ "studentId": "1209362", "subjectId": "sub3", "absences": 2 }),
    );
    let synced = b.request_ok("storage.sync", json!({}));
    assert_eq!(changed_keys(&synced), vec!["ies_attendance"]);
    assert_eq!(synced.get("changed").and_then(|v| v.as_bool()), Some(true));

    drop(a);
    drop(b);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn data_survives_a_restart_and_corrupt_values_fall_back_to_seed() {
    let workspace = temp_workspace("iesportal-persist-restart");
    {
        let mut s = spawn_sidecar();
        s.select(&workspace);
        s.login("admin", "admin123");
        let _ = s.request_ok(
            "attendance.update",
            json!({ "studentId": "2984619", "subjectId": "sub6", "absences": 4 }),
        );
        let _ = s.request_ok("storage.save", json!({}));
    }

    let mut s = spawn_sidecar();
    s.select(&workspace);
    s.login("admin", "admin123");
    let data = s.request_ok("students.data", json!({ "studentId": "2984619" }));
    let rows = data.get("attendance").and_then(|v| v.as_array()).expect("attendance");
    assert!(rows.iter().any(|r| {
        r.get("subjectId").and_then(|v| v.as_str()) == Some("sub6")
            && r.get("absences").and_then(|v| v.as_u64()) == Some(4)
    }));
    drop(s);

    // Clobber the stored users with something that is not a user list.
    {
        let conn = rusqlite::Connection::open(workspace.join("portal.sqlite3")).expect("open db");
        conn.execute(
            "UPDATE kv_entries SET value = '{\"broken\":', digest = '' WHERE key = 'ies_users'",
            [],
        )
        .expect("corrupt users");
    }
    let mut s = spawn_sidecar();
    s.select(&workspace);
    s.login("admin", "admin123");
    let users = s.request_ok("users.list", json!({}));
    assert_eq!(
        users.get("users").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(4)
    );

    drop(s);
    let _ = std::fs::remove_dir_all(workspace);
}
