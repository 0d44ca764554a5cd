mod test_support;

use serde_json::json;
use test_support::{
    create_school, create_student, request, request_err, request_ok, select_workspace,
    send_line, spawn_sidecar,
};

#[test]
fn list_methods_answer_empty_before_a_workspace_is_selected() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "h", "health", json!({}));
    assert!(health["workspacePath"].is_null());

    for (method, key) in [
        ("schools.list", "schools"),
        ("students.list", "students"),
        ("attendance.list", "records"),
        ("leave.list", "requests"),
        ("visitors.list", "visitors"),
        ("clinic.list", "visits"),
        ("users.list", "users"),
        ("logs.list", "entries"),
    ] {
        let res = request_ok(&mut stdin, &mut reader, method, method, json!({}));
        assert_eq!(res[key], json!([]), "{} should be empty", method);
    }

    for method in ["schools.save", "attendance.save", "session.login", "backup.export"] {
        let code = request_err(&mut stdin, &mut reader, method, method, json!({}));
        assert!(
            code == "no_workspace" || code == "bad_params",
            "{} answered {}",
            method,
            code
        );
    }
    let code = request_err(
        &mut stdin,
        &mut reader,
        "nw",
        "dashboard.summary",
        json!({ "schoolId": "x" }),
    );
    assert_eq!(code, "no_workspace");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_lines_and_unknown_methods_get_error_envelopes() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let resp = send_line(&mut stdin, &mut reader, "{not json");
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("bad_json"));

    let resp = send_line(&mut stdin, &mut reader, r#"{"id":"m1","params":{}}"#);
    assert_eq!(resp["id"], json!("m1"));
    assert_eq!(resp["error"]["code"], json!("bad_json"));

    let resp = request(&mut stdin, &mut reader, "u1", "grades.compute", json!({}));
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("not_implemented"));

    // The daemon keeps serving after errors.
    let health = request_ok(&mut stdin, &mut reader, "h2", "health", json!({}));
    assert!(health["version"].is_string());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn every_method_family_is_routed() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let workspace = select_workspace(&mut stdin, &mut reader, "schoold-smoke");

    let health = request_ok(&mut stdin, &mut reader, "h", "health", json!({}));
    assert_eq!(
        health["workspacePath"].as_str(),
        Some(workspace.to_string_lossy().as_ref())
    );
    let cfg = request_ok(&mut stdin, &mut reader, "cfg", "config.get", json!({}));
    assert_eq!(cfg["attendance"]["atRiskThreshold"], json!(75));
    assert_eq!(cfg["attendance"]["lateAfter"], json!("07:30"));

    let school_id = create_school(&mut stdin, &mut reader, "Al Noor", Some("2030-01-01"));
    let student_id = create_student(&mut stdin, &mut reader, &school_id, "Ahmed Ali", "5A");

    let grades = request_ok(
        &mut stdin,
        &mut reader,
        "g",
        "students.grades",
        json!({ "schoolId": school_id }),
    );
    assert_eq!(grades["grades"], json!(["5A"]));

    let event = request_ok(
        &mut stdin,
        &mut reader,
        "ev",
        "events.save",
        json!({
            "schoolId": school_id,
            "title": "Science fair",
            "date": "2025-03-10",
            "type": "activity",
        }),
    );
    assert!(event["event"]["id"].is_string());
    let events = request_ok(
        &mut stdin,
        &mut reader,
        "evl",
        "events.list",
        json!({ "schoolId": school_id }),
    );
    assert_eq!(events["events"].as_array().map(|a| a.len()), Some(1));

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "bh",
        "behavior.add",
        json!({
            "schoolId": school_id,
            "studentId": student_id,
            "date": "2025-03-02",
            "points": 5,
            "reason": "Helped a classmate",
        }),
    );
    assert_eq!(added["record"]["points"], json!(5));
    let board = request_ok(
        &mut stdin,
        &mut reader,
        "lb",
        "behavior.leaderboard",
        json!({ "schoolId": school_id }),
    );
    assert_eq!(board["rows"][0]["score"], json!(105));

    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "sub",
        "subjects.save",
        json!({ "schoolId": school_id, "name": "Math", "grade": "5A" }),
    );
    let subject_id = subject["subject"]["id"].as_str().expect("subject id").to_string();
    let slot = request_ok(
        &mut stdin,
        &mut reader,
        "slot",
        "schedule.save",
        json!({
            "schoolId": school_id,
            "grade": "5A",
            "dayOfWeek": 0,
            "period": 1,
            "subjectId": subject_id,
        }),
    );
    assert!(slot["slot"]["id"].is_string());

    let wa = request_ok(
        &mut stdin,
        &mut reader,
        "wa",
        "links.whatsapp",
        json!({ "phone": "0501234567", "message": "hi there" }),
    );
    assert_eq!(wa["url"], json!("https://wa.me/966501234567?text=hi%20there"));

    let card = request_ok(
        &mut stdin,
        &mut reader,
        "card",
        "print.idCard",
        json!({ "studentId": student_id }),
    );
    assert!(card["html"].as_str().unwrap_or_default().contains("Ahmed Ali"));

    let prepared = request_ok(
        &mut stdin,
        &mut reader,
        "ai",
        "ai.prepare",
        json!({ "task": "attendance_analysis", "schoolId": school_id }),
    );
    assert!(prepared["prompt"].as_str().unwrap_or_default().contains("Al Noor"));

    let logs = request_ok(&mut stdin, &mut reader, "logs", "logs.list", json!({}));
    let actions: Vec<&str> = logs["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert!(actions.contains(&"schools.save"));
    assert!(actions.contains(&"students.save"));

    drop(stdin);
    let _ = child.wait();
}
