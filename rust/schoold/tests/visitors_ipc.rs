mod test_support;

use serde_json::json;
use test_support::{create_school, request, request_ok, select_workspace, spawn_sidecar};

#[test]
fn visitor_checks_out_exactly_once() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ws = select_workspace(&mut stdin, &mut reader, "schoold-visitors");
    let school_id = create_school(&mut stdin, &mut reader, "Al Noor", None);

    let visitor = request_ok(
        &mut stdin,
        &mut reader,
        "in",
        "visitors.checkIn",
        json!({
            "schoolId": school_id,
            "name": "Khalid",
            "purpose": "Parent meeting",
            "today": "2025-03-04",
            "now": "09:05",
        }),
    );
    let id = visitor["visitor"]["id"].as_str().expect("visitor id").to_string();
    assert_eq!(visitor["visitor"]["checkInTime"], json!("09:05"));
    assert!(visitor["visitor"]["checkOutTime"].is_null());

    let on_site = request_ok(
        &mut stdin,
        &mut reader,
        "site",
        "visitors.list",
        json!({ "schoolId": school_id, "onSite": true }),
    );
    assert_eq!(on_site["visitors"].as_array().map(|a| a.len()), Some(1));

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "dash",
        "dashboard.summary",
        json!({ "schoolId": school_id, "date": "2025-03-04" }),
    );
    assert_eq!(summary["visitorsOnSite"], json!(1));

    let out = request_ok(
        &mut stdin,
        &mut reader,
        "out",
        "visitors.checkOut",
        json!({ "id": id, "now": "10:00" }),
    );
    assert_eq!(out["visitor"]["checkOutTime"], json!("10:00"));

    let again = request(
        &mut stdin,
        &mut reader,
        "out2",
        "visitors.checkOut",
        json!({ "id": id, "now": "11:00" }),
    );
    assert_eq!(again["ok"], json!(false));
    assert_eq!(again["error"]["code"], json!("conflict"));
    assert_eq!(again["error"]["details"]["reason"], json!("already_checked_out"));

    let on_site = request_ok(
        &mut stdin,
        &mut reader,
        "site2",
        "visitors.list",
        json!({ "schoolId": school_id, "onSite": true }),
    );
    assert_eq!(on_site["visitors"], json!([]));

    let missing = request(
        &mut stdin,
        &mut reader,
        "out3",
        "visitors.checkOut",
        json!({ "id": "nope", "now": "11:00" }),
    );
    assert_eq!(missing["error"]["code"], json!("not_found"));

    drop(stdin);
    let _ = child.wait();
}
