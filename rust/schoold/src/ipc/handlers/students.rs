use crate::calc::{AttendanceTally, RateSummary};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, parse_params, run, run_list, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use crate::store::attendance::{self, AttendanceFilter};
use crate::store::students::{self, StudentFilter};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Students with their attendance rate over every recorded day.
fn students_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let filter: StudentFilter = parse_params(params)?;
    let roster = students::list_students(ctx.conn, &filter)?;
    let records = attendance::list_records(
        ctx.conn,
        &AttendanceFilter {
            school_id: filter.school_id.clone(),
            grade: filter.grade.clone(),
            ..Default::default()
        },
    )?;
    let mut tallies: HashMap<&str, AttendanceTally> = HashMap::new();
    for r in &records {
        tallies.entry(r.student_id.as_str()).or_default().add(r.status);
    }
    let rows: Vec<Value> = roster
        .iter()
        .map(|s| {
            let summary =
                RateSummary::from_tally(tallies.get(s.id.as_str()).copied().unwrap_or_default());
            json!({
                "id": s.id,
                "schoolId": s.school_id,
                "name": s.name,
                "grade": s.grade,
                "parentPhone": s.parent_phone,
                "nationalId": s.national_id,
                "attendanceRate": summary.rate,
                "rateLabel": summary.label,
            })
        })
        .collect();
    Ok(json!({ "students": rows }))
}

fn students_grades(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    Ok(json!({ "grades": students::list_grades(ctx.conn, &school_id)? }))
}

fn students_save(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student: Student = parse_params(params)?;
    let saved = students::save_student(ctx.conn, student)?;
    ctx.audit("students.save", json!({ "id": saved.id, "name": saved.name }));
    Ok(json!({ "student": saved }))
}

fn students_delete(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    students::delete_student(ctx.conn, &id)?;
    ctx.audit("students.delete", json!({ "id": id }));
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.list" => Some(run_list(state, req, json!({ "students": [] }), students_list)),
        "students.grades" => Some(run_list(state, req, json!({ "grades": [] }), students_grades)),
        "students.save" => Some(run(state, req, students_save)),
        "students.delete" => Some(run(state, req, students_delete)),
        _ => None,
    }
}
