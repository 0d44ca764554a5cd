use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_str, get_required_str, parse_params, run, run_list, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::model::{ScheduleSlot, Subject};
use crate::store::academics;
use serde_json::{json, Value};

fn subjects_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    Ok(json!({ "subjects": academics::list_subjects(ctx.conn, &school_id)? }))
}

fn subjects_save(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let subject: Subject = parse_params(params)?;
    let saved = academics::save_subject(ctx.conn, subject)?;
    ctx.audit("subjects.save", json!({ "id": saved.id, "name": saved.name }));
    Ok(json!({ "subject": saved }))
}

fn subjects_delete(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    academics::delete_subject(ctx.conn, &id)?;
    ctx.audit("subjects.delete", json!({ "id": id }));
    Ok(json!({ "ok": true }))
}

fn schedule_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    let slots = academics::list_slots(
        ctx.conn,
        &school_id,
        get_opt_str(params, "grade"),
        get_opt_str(params, "teacherId"),
    )?;
    Ok(json!({ "slots": slots }))
}

fn schedule_save(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let slot: ScheduleSlot = parse_params(params)?;
    let saved = academics::save_slot(ctx.conn, slot)?;
    ctx.audit(
        "schedule.save",
        json!({ "id": saved.id, "grade": saved.grade, "day": saved.day_of_week, "period": saved.period }),
    );
    Ok(json!({ "slot": saved }))
}

fn schedule_delete(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    academics::delete_slot(ctx.conn, &id)?;
    ctx.audit("schedule.delete", json!({ "id": id }));
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "subjects.list" => Some(run_list(state, req, json!({ "subjects": [] }), subjects_list)),
        "subjects.save" => Some(run(state, req, subjects_save)),
        "subjects.delete" => Some(run(state, req, subjects_delete)),
        "schedule.list" => Some(run_list(state, req, json!({ "slots": [] }), schedule_list)),
        "schedule.save" => Some(run(state, req, schedule_save)),
        "schedule.delete" => Some(run(state, req, schedule_delete)),
        _ => None,
    }
}
