use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, now_hhmm, parse_params, run, run_list, today, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::store::visitors::{self, NewVisitor, VisitorFilter};
use serde_json::{json, Value};

fn visitors_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let filter: VisitorFilter = parse_params(params)?;
    Ok(json!({ "visitors": visitors::list_visitors(ctx.conn, &filter)? }))
}

fn visitors_check_in(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let input: NewVisitor = parse_params(params)?;
    let visitor = visitors::check_in(ctx.conn, input, today(params)?, &now_hhmm(params)?)?;
    ctx.audit(
        "visitors.checkIn",
        json!({ "id": visitor.id, "name": visitor.name }),
    );
    Ok(json!({ "visitor": visitor }))
}

fn visitors_check_out(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let visitor = visitors::check_out(ctx.conn, &id, &now_hhmm(params)?).map_err(|e| {
        let conflict = e.code() == "conflict";
        let mut he = HandlerErr::from(e);
        if conflict {
            he = he.with_details(json!({ "reason": "already_checked_out" }));
        }
        he
    })?;
    tracing::info!(visitor_id = %id, "visitor checked out");
    ctx.audit("visitors.checkOut", json!({ "id": id }));
    Ok(json!({ "visitor": visitor }))
}

fn visitors_delete(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    visitors::delete_visitor(ctx.conn, &id)?;
    ctx.audit("visitors.delete", json!({ "id": id }));
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "visitors.list" => Some(run_list(state, req, json!({ "visitors": [] }), visitors_list)),
        "visitors.checkIn" => Some(run(state, req, visitors_check_in)),
        "visitors.checkOut" => Some(run(state, req, visitors_check_out)),
        "visitors.delete" => Some(run(state, req, visitors_delete)),
        _ => None,
    }
}
