use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, parse_field, parse_params, run, run_list, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::model::LeaveStatus;
use crate::store::leave::{self, LeaveFilter, NewLeaveRequest};
use serde_json::{json, Value};

fn leave_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let filter: LeaveFilter = parse_params(params)?;
    Ok(json!({ "requests": leave::list_requests(ctx.conn, &filter)? }))
}

fn leave_create(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let input: NewLeaveRequest = parse_params(params)?;
    let request = leave::create_request(ctx.conn, input, ctx.actor())?;
    ctx.audit(
        "leave.create",
        json!({ "id": request.id, "studentId": request.student_id, "type": request.kind }),
    );
    Ok(json!({ "request": request }))
}

fn leave_decide(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let decision: LeaveStatus = parse_field(params, "decision")?;
    let outcome = leave::decide_request(ctx.conn, &id, decision, ctx.actor())?;
    tracing::info!(request_id = %id, decision = %decision, "leave request decided");
    ctx.audit("leave.decide", json!({ "id": id, "decision": decision }));
    Ok(json!({
        "request": outcome.request,
        "excusedRecord": outcome.excused,
    }))
}

fn leave_delete(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    leave::delete_request(ctx.conn, &id)?;
    ctx.audit("leave.delete", json!({ "id": id }));
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "leave.list" => Some(run_list(state, req, json!({ "requests": [] }), leave_list)),
        "leave.create" => Some(run(state, req, leave_create)),
        "leave.decide" => Some(run(state, req, leave_decide)),
        "leave.delete" => Some(run(state, req, leave_delete)),
        _ => None,
    }
}
