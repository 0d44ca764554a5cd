use crate::config::Config;
use crate::db;
use crate::ipc::error::{err, HandlerErr};
use crate::ipc::helpers::{get_required_str, respond, Ctx};
use crate::ipc::types::{AppState, Request, Session};
use crate::model::Role;
use crate::store::users;
use rusqlite::Connection;
use serde_json::{json, Value};

const SESSION_USER_KEY: &str = "session.userId";
const IMPERSONATOR_KEY: &str = "session.impersonator";

fn read_id(conn: &Connection, key: &str) -> Option<String> {
    match db::settings_get_json(conn, key) {
        Ok(v) => v.and_then(|v| v.as_str().map(str::to_string)),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring unreadable session setting");
            None
        }
    }
}

/// Session persisted in the workspace, or signed out.
pub fn load_session(conn: &Connection) -> Session {
    Session {
        user_id: read_id(conn, SESSION_USER_KEY),
        impersonator: read_id(conn, IMPERSONATOR_KEY),
    }
}

fn persist(conn: &Connection, session: &Session) -> Result<(), HandlerErr> {
    let write = |key: &str, value: &Option<String>| match value {
        Some(id) => db::settings_set_json(conn, key, &json!(id)),
        None => db::settings_delete(conn, key),
    };
    write(SESSION_USER_KEY, &session.user_id)
        .and_then(|_| write(IMPERSONATOR_KEY, &session.impersonator))
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))
}

type SessionFn = fn(&Connection, &Config, &mut Session, &Value) -> Result<Value, HandlerErr>;

fn with_session(state: &mut AppState, req: &Request, f: SessionFn) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    respond(&req.id, f(conn, &state.config, &mut state.session, &req.params))
}

fn audit(conn: &Connection, config: &Config, session: &Session, action: &str, details: Value) {
    Ctx {
        conn,
        config,
        session,
    }
    .audit(action, details);
}

fn session_login(
    conn: &Connection,
    config: &Config,
    session: &mut Session,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let username = get_required_str(params, "username")?;
    let password = params
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let Some(user) = users::verify_login(conn, &username, password)? else {
        tracing::info!(username = %username, "login rejected");
        return Err(HandlerErr::new(
            "unauthenticated",
            "invalid username or password",
        ));
    };
    let next = Session {
        user_id: Some(user.id.clone()),
        impersonator: None,
    };
    persist(conn, &next)?;
    *session = next;
    audit(conn, config, session, "session.login", json!({ "username": user.username }));
    Ok(json!({ "user": user }))
}

fn session_logout(
    conn: &Connection,
    config: &Config,
    session: &mut Session,
    _params: &Value,
) -> Result<Value, HandlerErr> {
    if session.user_id.is_some() {
        audit(conn, config, session, "session.logout", Value::Null);
    }
    let next = Session::default();
    persist(conn, &next)?;
    *session = next;
    Ok(json!({ "ok": true }))
}

fn session_current(
    conn: &Connection,
    _config: &Config,
    session: &mut Session,
    _params: &Value,
) -> Result<Value, HandlerErr> {
    let user = match session.user_id.as_deref() {
        Some(id) => users::find_user(conn, id)?,
        None => None,
    };
    let impersonator = match session.impersonator.as_deref() {
        Some(id) => users::find_user(conn, id)?,
        None => None,
    };
    Ok(json!({
        "user": user,
        "impersonator": impersonator,
        "impersonating": impersonator.is_some(),
    }))
}

/// A general manager takes on another user's identity. The real identity is
/// remembered so it can be restored.
fn session_impersonate(
    conn: &Connection,
    config: &Config,
    session: &mut Session,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let target_id = get_required_str(params, "userId")?;
    let Some(real_id) = session
        .impersonator
        .clone()
        .or_else(|| session.user_id.clone())
    else {
        return Err(HandlerErr::new("unauthenticated", "sign in first"));
    };
    let real = users::get_user(conn, &real_id)?;
    if real.role != Role::GeneralManager {
        return Err(HandlerErr::new(
            "forbidden",
            "only a general manager may impersonate",
        ));
    }
    let target = users::get_user(conn, &target_id)?;
    if !target.active {
        return Err(HandlerErr::new("conflict", "target user is inactive"));
    }
    audit(
        conn,
        config,
        &Session {
            user_id: Some(real.id.clone()),
            impersonator: None,
        },
        "session.impersonate",
        json!({ "targetUserId": target.id, "targetUsername": target.username }),
    );
    let next = Session {
        user_id: Some(target.id.clone()),
        impersonator: Some(real.id.clone()),
    };
    persist(conn, &next)?;
    *session = next;
    tracing::info!(impersonator = %real.id, target = %target.id, "impersonation started");
    Ok(json!({ "user": target, "impersonator": real }))
}

fn session_stop_impersonation(
    conn: &Connection,
    config: &Config,
    session: &mut Session,
    _params: &Value,
) -> Result<Value, HandlerErr> {
    let Some(real_id) = session.impersonator.clone() else {
        return Err(HandlerErr::new("conflict", "not impersonating"));
    };
    let previous = session.user_id.clone();
    let next = Session {
        user_id: Some(real_id.clone()),
        impersonator: None,
    };
    persist(conn, &next)?;
    *session = next;
    audit(
        conn,
        config,
        session,
        "session.stopImpersonation",
        json!({ "targetUserId": previous }),
    );
    tracing::info!(impersonator = %real_id, "impersonation stopped");
    Ok(json!({ "user": users::find_user(conn, &real_id)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "session.login" => Some(with_session(state, req, session_login)),
        "session.logout" => Some(with_session(state, req, session_logout)),
        "session.current" => Some(with_session(state, req, session_current)),
        "session.impersonate" => Some(with_session(state, req, session_impersonate)),
        "session.stopImpersonation" => {
            Some(with_session(state, req, session_stop_impersonation))
        }
        _ => None,
    }
}
