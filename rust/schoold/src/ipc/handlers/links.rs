use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{get_opt_date, get_required_str, run, today, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::links;
use crate::store::{attendance, students};
use serde_json::{json, Value};

fn handle_links_whatsapp(state: &mut AppState, req: &Request) -> Value {
    let phone = get_required_str(&req.params, "phone");
    let message = req
        .params
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let url = phone
        .ok()
        .and_then(|p| links::whatsapp_url(&state.config.links, &p, message));
    match url {
        Some(url) => ok(&req.id, json!({ "url": url })),
        None => err(&req.id, "bad_params", "phone must contain digits", None),
    }
}

fn handle_links_qr(state: &mut AppState, req: &Request) -> Value {
    let Some(data) = req.params.get("data").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing data", None);
    };
    ok(
        &req.id,
        json!({ "url": links::qr_url(&state.config.links, data) }),
    )
}

/// Prefilled WhatsApp message to a student's parent about one day.
fn links_parent_notice(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let student = students::get_student(ctx.conn, &student_id)?;
    let date = match get_opt_date(params, "date")? {
        Some(d) => d,
        None => today(params)?,
    };
    let status = attendance::find_record(ctx.conn, &student_id, date)?.map(|r| r.status);
    let message = links::parent_notice(&student, status, date);
    let url = student
        .parent_phone
        .as_deref()
        .and_then(|p| links::whatsapp_url(&ctx.config.links, p, &message));
    Ok(json!({
        "message": message,
        "status": status,
        "url": url,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "links.whatsapp" => Some(handle_links_whatsapp(state, req)),
        "links.qr" => Some(handle_links_qr(state, req)),
        "links.parentNotice" => Some(run(state, req, links_parent_notice)),
        _ => None,
    }
}
