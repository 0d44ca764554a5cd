use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{parse_field, run, run_list, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::store::logs;
use serde_json::{json, Value};

fn logs_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let limit = match params.get("limit") {
        Some(_) => parse_field::<usize>(params, "limit")?,
        None => ctx.config.logs.max_entries,
    };
    Ok(json!({ "entries": logs::list(ctx.conn, limit)? }))
}

fn logs_clear(ctx: &Ctx<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let removed = logs::clear(ctx.conn)?;
    ctx.audit("logs.clear", json!({ "removed": removed }));
    Ok(json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "logs.list" => Some(run_list(state, req, json!({ "entries": [] }), logs_list)),
        "logs.clear" => Some(run(state, req, logs_clear)),
        _ => None,
    }
}
