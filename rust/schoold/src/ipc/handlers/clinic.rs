use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, parse_params, run, run_list, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::model::HealthRecord;
use crate::store::clinic::{self, NewVisit, VisitFilter};
use serde_json::{json, Value};

fn clinic_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let filter: VisitFilter = parse_params(params)?;
    Ok(json!({ "visits": clinic::list_visits(ctx.conn, &filter)? }))
}

fn clinic_create(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let input: NewVisit = parse_params(params)?;
    let recorded = clinic::record_visit(ctx.conn, input, ctx.actor())?;
    ctx.audit(
        "clinic.create",
        json!({
            "id": recorded.visit.id,
            "studentId": recorded.visit.student_id,
            "outcome": recorded.visit.outcome,
        }),
    );
    if let Some(pass) = &recorded.exit_pass {
        tracing::info!(student_id = %pass.student_id, request_id = %pass.id, "clinic filed exit pass");
    }
    Ok(json!({
        "visit": recorded.visit,
        "exitPass": recorded.exit_pass,
    }))
}

fn clinic_delete(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    clinic::delete_visit(ctx.conn, &id)?;
    ctx.audit("clinic.delete", json!({ "id": id }));
    Ok(json!({ "ok": true }))
}

fn health_get(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    Ok(json!({ "record": clinic::get_health(ctx.conn, &student_id)? }))
}

fn health_save(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let record: HealthRecord = parse_params(params)?;
    let saved = clinic::save_health(ctx.conn, record)?;
    ctx.audit("health.save", json!({ "studentId": saved.student_id }));
    Ok(json!({ "record": saved }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "clinic.list" => Some(run_list(state, req, json!({ "visits": [] }), clinic_list)),
        "clinic.create" => Some(run(state, req, clinic_create)),
        "clinic.delete" => Some(run(state, req, clinic_delete)),
        "health.get" => Some(run(state, req, health_get)),
        "health.save" => Some(run(state, req, health_save)),
        _ => None,
    }
}
