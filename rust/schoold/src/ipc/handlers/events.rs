use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_date, get_required_str, parse_params, run, run_list, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::model::SchoolEvent;
use crate::store::events;
use serde_json::{json, Value};

fn events_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    let rows = events::list_events(
        ctx.conn,
        &school_id,
        get_opt_date(params, "from")?,
        get_opt_date(params, "to")?,
    )?;
    Ok(json!({ "events": rows }))
}

fn events_save(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let event: SchoolEvent = parse_params(params)?;
    let saved = events::save_event(ctx.conn, event)?;
    ctx.audit("events.save", json!({ "id": saved.id, "title": saved.title }));
    Ok(json!({ "event": saved }))
}

fn events_delete(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    events::delete_event(ctx.conn, &id)?;
    ctx.audit("events.delete", json!({ "id": id }));
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "events.list" => Some(run_list(state, req, json!({ "events": [] }), events_list)),
        "events.save" => Some(run(state, req, events_save)),
        "events.delete" => Some(run(state, req, events_delete)),
        _ => None,
    }
}
