use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_opt_str, get_required_str, parse_field, parse_params, run, run_list, today, Ctx,
};
use crate::ipc::types::{AppState, Request};
use crate::store::behavior::{self, BehaviorFilter};
use serde_json::{json, Value};

fn behavior_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let filter: BehaviorFilter = parse_params(params)?;
    Ok(json!({ "records": behavior::list_behavior(ctx.conn, &filter)? }))
}

fn behavior_add(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let points: i64 = parse_field(params, "points")?;
    let reason = get_opt_str(params, "reason").unwrap_or_default();
    let date = match params.get("date") {
        Some(_) => parse_field(params, "date")?,
        None => today(params)?,
    };
    let record =
        behavior::add_behavior(ctx.conn, &student_id, date, points, &reason, ctx.actor())?;
    ctx.audit(
        "behavior.add",
        json!({ "studentId": student_id, "points": points }),
    );
    Ok(json!({
        "record": record,
        "score": behavior::student_score(ctx.conn, &student_id)?,
    }))
}

fn behavior_delete(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    behavior::delete_behavior(ctx.conn, &id)?;
    ctx.audit("behavior.delete", json!({ "id": id }));
    Ok(json!({ "ok": true }))
}

fn behavior_leaderboard(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    let limit = match params.get("limit") {
        Some(_) => Some(parse_field::<usize>(params, "limit")?),
        None => None,
    };
    let rows = behavior::leaderboard(ctx.conn, &school_id, get_opt_str(params, "grade"), limit)?;
    Ok(json!({ "rows": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "behavior.list" => Some(run_list(state, req, json!({ "records": [] }), behavior_list)),
        "behavior.add" => Some(run(state, req, behavior_add)),
        "behavior.delete" => Some(run(state, req, behavior_delete)),
        "behavior.leaderboard" => Some(run_list(
            state,
            req,
            json!({ "rows": [] }),
            behavior_leaderboard,
        )),
        _ => None,
    }
}
