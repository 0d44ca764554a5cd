use super::attendance::{load_school_history, risk_rules};
use crate::calc::{self, AttendanceTally, RateSummary};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_date, get_required_str, run, today, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceStatus, LeaveKind, LeaveStatus};
use crate::notify::{self, Snapshot};
use crate::store::leave::{self, LeaveFilter};
use crate::store::visitors::{self, VisitorFilter};
use serde_json::{json, Value};
use std::collections::HashSet;

fn dashboard_summary(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    let date = match get_opt_date(params, "date")? {
        Some(d) => d,
        None => today(params)?,
    };
    let (roster, records) = load_school_history(ctx, &school_id, None)?;

    let day = AttendanceTally::from_records(records.iter().filter(|r| r.date == date));
    let overall = calc::rate_summary(&records);
    let snap = Snapshot {
        schools: &[],
        students: &roster,
        records: &records,
        leaves: &[],
    };
    let at_risk = notify::at_risk_students(&snap, risk_rules(ctx)).len();
    let pending = leave::list_requests(
        ctx.conn,
        &LeaveFilter {
            school_id: Some(school_id.clone()),
            status: Some(LeaveStatus::Pending),
            ..Default::default()
        },
    )?
    .len();
    let visitors_on_site = visitors::list_visitors(
        ctx.conn,
        &VisitorFilter {
            school_id: Some(school_id.clone()),
            date: Some(date),
            on_site: true,
        },
    )?
    .len();
    // Absent and excused students are not in the building, nor are students
    // whose gate pass was scanned today. Unmarked ones are assumed present.
    let exited = leave::list_requests(
        ctx.conn,
        &LeaveFilter {
            school_id: Some(school_id.clone()),
            kind: Some(LeaveKind::EarlyExit),
            date: Some(date),
            ..Default::default()
        },
    )?;
    let off_site: HashSet<&str> = records
        .iter()
        .filter(|r| r.date == date)
        .filter(|r| matches!(r.status, AttendanceStatus::Absent | AttendanceStatus::Excused))
        .map(|r| r.student_id.as_str())
        .chain(
            exited
                .iter()
                .filter(|l| l.actual_exit_time.is_some())
                .map(|l| l.student_id.as_str()),
        )
        .collect();
    let off_site = off_site.len();

    Ok(json!({
        "schoolId": school_id,
        "date": date,
        "studentCount": roster.len(),
        "today": day,
        "unmarked": roster.len().saturating_sub(day.total),
        "todayRate": RateSummary::from_tally(day),
        "overallRate": overall,
        "atRiskCount": at_risk,
        "pendingLeaveCount": pending,
        "studentsOnSite": roster.len().saturating_sub(off_site),
        "visitorsOnSite": visitors_on_site,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "dashboard.summary" => Some(run(state, req, dashboard_summary)),
        _ => None,
    }
}
