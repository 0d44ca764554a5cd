use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, parse_field, parse_params, run, run_list, today, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::model::School;
use crate::store::{schools, users};
use serde_json::{json, Value};

fn schools_list(ctx: &Ctx<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    Ok(json!({ "schools": schools::list_schools(ctx.conn)? }))
}

fn schools_save(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let school: School = parse_params(params)?;
    let saved = schools::save_school(ctx.conn, school)?;
    ctx.audit("schools.save", json!({ "id": saved.id, "name": saved.name }));
    Ok(json!({ "school": saved }))
}

fn schools_renew(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let days: i64 = parse_field(params, "days")?;
    let school = schools::renew_subscription(ctx.conn, &id, days, today(params)?)?;
    ctx.audit(
        "schools.renew",
        json!({ "id": id, "days": days, "subscriptionEnd": school.subscription_end }),
    );
    Ok(json!({ "school": school }))
}

/// Deleting a school removes its users, so the school of the signed-in user
/// (or of a hidden impersonator) cannot be deleted.
fn schools_delete(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let signed_in = [
        ctx.session.user_id.as_deref(),
        ctx.session.impersonator.as_deref(),
    ];
    for user_id in signed_in.into_iter().flatten() {
        let Some(user) = users::find_user(ctx.conn, user_id)? else {
            continue;
        };
        if user.school_id.as_deref() == Some(id.as_str()) {
            return Err(HandlerErr::new(
                "conflict",
                "cannot delete the school of the signed-in user",
            )
            .with_details(json!({ "userId": user.id })));
        }
    }
    schools::delete_school(ctx.conn, &id)?;
    ctx.audit("schools.delete", json!({ "id": id }));
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "schools.list" => Some(run_list(state, req, json!({ "schools": [] }), schools_list)),
        "schools.save" => Some(run(state, req, schools_save)),
        "schools.renew" => Some(run(state, req, schools_renew)),
        "schools.delete" => Some(run(state, req, schools_delete)),
        _ => None,
    }
}
