use crate::gatepass::{self, GateCheck};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, now_hhmm, run, today, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::links;
use crate::model::{AttendanceStatus, LeaveKind, LeaveStatus};
use crate::store::{attendance, leave, students};
use chrono::NaiveTime;
use serde_json::{json, Value};

fn gatepass_issue(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "requestId")?;
    let request = leave::get_request(ctx.conn, &id)?;
    if request.kind != LeaveKind::EarlyExit || request.status != LeaveStatus::Approved {
        return Err(HandlerErr::new(
            "conflict",
            "only approved early-exit requests get a gate pass",
        )
        .with_details(json!({ "type": request.kind, "status": request.status })));
    }
    let token = gatepass::token_for(&request.id);
    Ok(json!({
        "token": token,
        "qrUrl": links::qr_url(&ctx.config.links, &token),
        "request": request,
    }))
}

fn scan_token(ctx: &Ctx<'_>, params: &Value, token: &str) -> Result<Value, HandlerErr> {
    let outcome = gatepass::scan(ctx.conn, token, today(params)?, &now_hhmm(params)?)?;
    if outcome.valid {
        ctx.audit(
            "gatepass.scan",
            json!({ "requestId": outcome.request.as_ref().map(|r| r.id.clone()) }),
        );
    } else if outcome.reason != GateCheck::InvalidToken {
        tracing::warn!(reason = ?outcome.reason, "gate pass rejected");
    }
    Ok(json!({
        "valid": outcome.valid,
        "reason": outcome.reason,
        "request": outcome.request,
    }))
}

fn gatepass_scan(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let token = get_required_str(params, "token")?;
    scan_token(ctx, params, &token)
}

/// One scanner for the school gate: gate-pass tokens are checked as passes,
/// anything else is taken as a student id and checks the student in.
fn kiosk_scan(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let code = get_required_str(params, "code")?;
    if gatepass::parse_token(&code).is_some() || code.starts_with(gatepass::TOKEN_PREFIX) {
        let mut result = scan_token(ctx, params, &code)?;
        result["kind"] = json!("gatePass");
        return Ok(result);
    }

    let student = students::get_student(ctx.conn, &code)?;
    let date = today(params)?;
    if let Some(existing) = attendance::find_record(ctx.conn, &student.id, date)? {
        return Ok(json!({
            "kind": "attendance",
            "recorded": false,
            "student": student,
            "record": existing,
        }));
    }
    let now = now_hhmm(params)?;
    let scanned_at = NaiveTime::parse_from_str(&now, "%H:%M")
        .map_err(|_| HandlerErr::bad_params("now must be HH:MM"))?;
    let status = if scanned_at > ctx.config.attendance.late_after_time() {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    };
    let record = attendance::save_record(
        ctx.conn,
        &student.id,
        date,
        status,
        Some(format!("kiosk {}", now)),
        ctx.actor(),
    )?;
    ctx.audit(
        "kiosk.scan",
        json!({ "studentId": student.id, "status": status }),
    );
    Ok(json!({
        "kind": "attendance",
        "recorded": true,
        "student": student,
        "record": record,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "gatepass.issue" => Some(run(state, req, gatepass_issue)),
        "gatepass.scan" => Some(run(state, req, gatepass_scan)),
        "kiosk.scan" => Some(run(state, req, kiosk_scan)),
        _ => None,
    }
}
