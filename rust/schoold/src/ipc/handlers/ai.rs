use super::attendance::{load_school_history, risk_rules};
use crate::ai::{self, AiTask, SchoolStats};
use crate::calc;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_str, get_required_str, parse_field, run, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::notify::{self, Snapshot};
use crate::store::{schools, students};
use serde_json::{json, Value};
use std::collections::HashMap;

fn school_stats(ctx: &Ctx<'_>, school_id: &str) -> Result<SchoolStats, HandlerErr> {
    let school = schools::get_school(ctx.conn, school_id)?;
    let (roster, records) = load_school_history(ctx, school_id, None)?;
    let snap = Snapshot {
        schools: &[],
        students: &roster,
        records: &records,
        leaves: &[],
    };
    let names: HashMap<&str, &str> = roster
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();
    let name_of = |sid: &str| names.get(sid).copied().unwrap_or(sid).to_string();
    Ok(SchoolStats {
        school_name: school.name,
        student_count: roster.len(),
        overall: calc::rate_summary(&records),
        at_risk: notify::at_risk_students(&snap, risk_rules(ctx))
            .into_iter()
            .map(|(sid, t)| (name_of(sid), t.rate()))
            .collect(),
        streaks: notify::absence_streaks(&snap, ctx.config.attendance.absence_streak_days)
            .into_iter()
            .map(|(sid, _)| name_of(sid))
            .collect(),
    })
}

fn ai_prepare(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let task: AiTask = parse_field(params, "task")?;
    let prepared = match task {
        AiTask::AttendanceAnalysis => {
            let school_id = get_required_str(params, "schoolId")?;
            ai::attendance_analysis(&school_stats(ctx, &school_id)?)
        }
        AiTask::ParentMessage => {
            let student = students::get_student(ctx.conn, &get_required_str(params, "studentId")?)?;
            ai::parent_message(&student, &get_required_str(params, "issue")?)
        }
        AiTask::AttendanceCommand => {
            let school_id = get_required_str(params, "schoolId")?;
            let roster = students::list_students(
                ctx.conn,
                &students::StudentFilter {
                    school_id: Some(school_id),
                    grade: get_opt_str(params, "grade"),
                },
            )?;
            ai::attendance_command(&get_required_str(params, "input")?, &roster)
        }
    };
    Ok(json!(prepared))
}

fn ai_interpret(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let task: AiTask = parse_field(params, "task")?;
    let reply = params
        .get("reply")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    match task {
        AiTask::AttendanceAnalysis | AiTask::ParentMessage => {
            Ok(json!({ "text": ai::interpret_text(reply) }))
        }
        AiTask::AttendanceCommand => {
            let school_id = get_required_str(params, "schoolId")?;
            let roster = students::list_students(
                ctx.conn,
                &students::StudentFilter {
                    school_id: Some(school_id),
                    grade: get_opt_str(params, "grade"),
                },
            )?;
            let raw = ai::parse_marks(reply);
            let parsed = raw.len();
            let marks = ai::resolve_marks(raw, &roster);
            if marks.len() < parsed {
                tracing::debug!(parsed, resolved = marks.len(), "some marks did not resolve");
            }
            Ok(json!({ "marks": marks }))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "ai.prepare" => Some(run(state, req, ai_prepare)),
        "ai.interpret" => Some(run(state, req, ai_interpret)),
        _ => None,
    }
}
