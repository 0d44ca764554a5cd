use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_str, get_required_str, parse_params, run, run_list, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::model::User;
use crate::store::users::{self, UserFilter};
use serde_json::{json, Value};

fn users_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let filter: UserFilter = parse_params(params)?;
    Ok(json!({ "users": users::list_users(ctx.conn, &filter)? }))
}

fn users_save(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let user: User = parse_params(params)?;
    let password = get_opt_str(params, "password");
    let saved = users::save_user(ctx.conn, user, password.as_deref())?;
    ctx.audit(
        "users.save",
        json!({ "id": saved.id, "username": saved.username, "role": saved.role }),
    );
    Ok(json!({ "user": saved }))
}

fn users_delete(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    if ctx.session.user_id.as_deref() == Some(id.as_str())
        || ctx.session.impersonator.as_deref() == Some(id.as_str())
    {
        return Err(HandlerErr::new("conflict", "cannot delete the signed-in user"));
    }
    users::delete_user(ctx.conn, &id)?;
    ctx.audit("users.delete", json!({ "id": id }));
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "users.list" => Some(run_list(state, req, json!({ "users": [] }), users_list)),
        "users.save" => Some(run(state, req, users_save)),
        "users.delete" => Some(run(state, req, users_delete)),
        _ => None,
    }
}
