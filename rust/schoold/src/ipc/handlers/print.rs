use crate::gatepass;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_date, get_opt_str, get_required_str, run, today, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::links;
use crate::print;
use crate::store::clinic::{self, VisitFilter};
use crate::store::{leave, schools, students};
use serde_json::{json, Value};

fn print_id_card(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student = students::get_student(ctx.conn, &get_required_str(params, "studentId")?)?;
    let school = schools::get_school(ctx.conn, &student.school_id)?;
    let qr = links::qr_url(&ctx.config.links, &student.id);
    Ok(json!({ "html": print::id_card(&school, &student, &qr) }))
}

fn print_gate_pass(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let request = leave::get_request(ctx.conn, &get_required_str(params, "requestId")?)?;
    let student = students::get_student(ctx.conn, &request.student_id)?;
    let school = schools::get_school(ctx.conn, &request.school_id)?;
    let qr = links::qr_url(&ctx.config.links, &gatepass::token_for(&request.id));
    Ok(json!({ "html": print::gate_pass(&school, &student, &request, &qr) }))
}

fn print_official_letter(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let school = schools::get_school(ctx.conn, &get_required_str(params, "schoolId")?)?;
    let subject = get_required_str(params, "subject")?;
    let body = get_required_str(params, "body")?;
    let date = match get_opt_date(params, "date")? {
        Some(d) => d,
        None => today(params)?,
    };
    let recipient = get_opt_str(params, "recipient");
    Ok(json!({
        "html": print::official_letter(&school, date, recipient.as_deref(), &subject, &body)
    }))
}

fn print_medical_report(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student = students::get_student(ctx.conn, &get_required_str(params, "studentId")?)?;
    let school = schools::get_school(ctx.conn, &student.school_id)?;
    let health = clinic::get_health(ctx.conn, &student.id)?;
    let visits = clinic::list_visits(
        ctx.conn,
        &VisitFilter {
            student_id: Some(student.id.clone()),
            ..Default::default()
        },
    )?;
    Ok(json!({
        "html": print::medical_report(&school, &student, health.as_ref(), &visits)
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "print.idCard" => Some(run(state, req, print_id_card)),
        "print.gatePass" => Some(run(state, req, print_gate_pass)),
        "print.officialLetter" => Some(run(state, req, print_official_letter)),
        "print.medicalReport" => Some(run(state, req, print_medical_report)),
        _ => None,
    }
}
