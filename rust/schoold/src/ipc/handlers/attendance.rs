use crate::calc::{self, AttendanceTally, RateSummary, RiskRules};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_opt_date, get_opt_str, get_required_str, parse_field, parse_params, run, run_list, Ctx,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceRecord, AttendanceStatus, Student};
use crate::notify::{self, Snapshot};
use crate::store::attendance::{self, AttendanceFilter, BulkMark};
use crate::store::behavior;
use crate::store::students::{self, StudentFilter};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Roster and every attendance record for a school (optionally one grade).
pub(crate) fn load_school_history(
    ctx: &Ctx<'_>,
    school_id: &str,
    grade: Option<String>,
) -> Result<(Vec<Student>, Vec<AttendanceRecord>), HandlerErr> {
    let roster = students::list_students(
        ctx.conn,
        &StudentFilter {
            school_id: Some(school_id.to_string()),
            grade: grade.clone(),
        },
    )?;
    let records = attendance::list_records(
        ctx.conn,
        &AttendanceFilter {
            school_id: Some(school_id.to_string()),
            grade,
            ..Default::default()
        },
    )?;
    Ok((roster, records))
}

pub(crate) fn risk_rules(ctx: &Ctx<'_>) -> RiskRules {
    RiskRules {
        threshold: ctx.config.attendance.at_risk_threshold,
        min_records: ctx.config.attendance.min_records_for_risk,
    }
}

fn attendance_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let filter: AttendanceFilter = parse_params(params)?;
    Ok(json!({ "records": attendance::list_records(ctx.conn, &filter)? }))
}

fn attendance_save(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let date: NaiveDate = parse_field(params, "date")?;
    let status: AttendanceStatus = parse_field(params, "status")?;
    let record = attendance::save_record(
        ctx.conn,
        &student_id,
        date,
        status,
        get_opt_str(params, "note"),
        ctx.actor(),
    )?;
    ctx.audit(
        "attendance.save",
        json!({ "studentId": student_id, "date": date, "status": status }),
    );
    Ok(json!({ "record": record }))
}

fn attendance_bulk_save(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let date: NaiveDate = parse_field(params, "date")?;
    let marks: Vec<BulkMark> = parse_field(params, "marks")?;
    let (saved, skipped) = attendance::save_bulk(ctx.conn, date, &marks, ctx.actor())?;
    ctx.audit(
        "attendance.bulkSave",
        json!({ "date": date, "saved": saved.len(), "skipped": skipped.len() }),
    );
    Ok(json!({ "saved": saved.len(), "skipped": skipped, "records": saved }))
}

fn attendance_delete(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    attendance::delete_record(ctx.conn, &id)?;
    ctx.audit("attendance.delete", json!({ "id": id }));
    Ok(json!({ "ok": true }))
}

/// The marking sheet for one day: every student with today's status (or
/// null) and their overall rate.
fn attendance_day_open(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    let date: NaiveDate = parse_field(params, "date")?;
    let (roster, records) = load_school_history(ctx, &school_id, get_opt_str(params, "grade"))?;

    let mut tallies: HashMap<&str, AttendanceTally> = HashMap::new();
    let mut today: HashMap<&str, &AttendanceRecord> = HashMap::new();
    for r in &records {
        tallies.entry(r.student_id.as_str()).or_default().add(r.status);
        if r.date == date {
            today.insert(r.student_id.as_str(), r);
        }
    }
    let day_tally = AttendanceTally::from_records(today.values().copied());
    let rows: Vec<Value> = roster
        .iter()
        .map(|s| {
            let rec = today.get(s.id.as_str());
            let summary =
                RateSummary::from_tally(tallies.get(s.id.as_str()).copied().unwrap_or_default());
            json!({
                "studentId": s.id,
                "name": s.name,
                "grade": s.grade,
                "status": rec.map(|r| r.status),
                "note": rec.and_then(|r| r.note.clone()),
                "attendanceRate": summary.rate,
                "rateLabel": summary.label,
            })
        })
        .collect();
    Ok(json!({
        "date": date,
        "rows": rows,
        "counts": day_tally,
        "unmarked": roster.len().saturating_sub(day_tally.total),
    }))
}

fn attendance_student_stats(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let student = students::get_student(ctx.conn, &student_id)?;
    let from = get_opt_date(params, "from")?;
    let to = get_opt_date(params, "to")?;
    let records = attendance::list_records(
        ctx.conn,
        &AttendanceFilter {
            student_id: Some(student_id.clone()),
            from,
            to,
            ..Default::default()
        },
    )?;
    let summary = calc::rate_summary(&records);
    let refs: Vec<&AttendanceRecord> = records.iter().collect();
    let on_streak =
        calc::has_absence_streak(&refs, ctx.config.attendance.absence_streak_days);
    Ok(json!({
        "student": student,
        "summary": summary,
        "atRisk": calc::is_at_risk(&summary.tally, risk_rules(ctx)),
        "absenceStreak": on_streak,
        "behaviorScore": behavior::student_score(ctx.conn, &student_id)?,
        "records": records,
    }))
}

fn attendance_at_risk(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    let (roster, records) = load_school_history(ctx, &school_id, get_opt_str(params, "grade"))?;
    let snap = Snapshot {
        schools: &[],
        students: &roster,
        records: &records,
        leaves: &[],
    };
    let by_id: HashMap<&str, &Student> = roster.iter().map(|s| (s.id.as_str(), s)).collect();
    let rows: Vec<Value> = notify::at_risk_students(&snap, risk_rules(ctx))
        .into_iter()
        .filter_map(|(sid, tally)| {
            let s = by_id.get(sid)?;
            Some(json!({
                "studentId": s.id,
                "name": s.name,
                "grade": s.grade,
                "rate": tally.rate(),
                "tally": tally,
            }))
        })
        .collect();
    Ok(json!({ "students": rows }))
}

fn attendance_absence_streaks(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    let days = match params.get("days") {
        Some(_) => parse_field::<usize>(params, "days")?,
        None => ctx.config.attendance.absence_streak_days,
    };
    if days == 0 {
        return Err(HandlerErr::bad_params("days must be at least 1"));
    }
    let (roster, records) = load_school_history(ctx, &school_id, get_opt_str(params, "grade"))?;
    let snap = Snapshot {
        schools: &[],
        students: &roster,
        records: &records,
        leaves: &[],
    };
    let by_id: HashMap<&str, &Student> = roster.iter().map(|s| (s.id.as_str(), s)).collect();
    let rows: Vec<Value> = notify::absence_streaks(&snap, days)
        .into_iter()
        .filter_map(|(sid, last)| {
            let s = by_id.get(sid)?;
            Some(json!({
                "studentId": s.id,
                "name": s.name,
                "grade": s.grade,
                "parentPhone": s.parent_phone,
                "lastAbsence": last,
            }))
        })
        .collect();
    Ok(json!({ "days": days, "students": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "attendance.list" => Some(run_list(state, req, json!({ "records": [] }), attendance_list)),
        "attendance.save" => Some(run(state, req, attendance_save)),
        "attendance.bulkSave" => Some(run(state, req, attendance_bulk_save)),
        "attendance.delete" => Some(run(state, req, attendance_delete)),
        "attendance.dayOpen" => Some(run(state, req, attendance_day_open)),
        "attendance.studentStats" => Some(run(state, req, attendance_student_stats)),
        "attendance.atRisk" => Some(run_list(
            state,
            req,
            json!({ "students": [] }),
            attendance_at_risk,
        )),
        "attendance.absenceStreaks" => Some(run_list(
            state,
            req,
            json!({ "students": [] }),
            attendance_absence_streaks,
        )),
        _ => None,
    }
}
