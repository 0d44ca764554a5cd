use crate::config::Config;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request, Session};
use crate::store;
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// What a storage-backed handler gets to work with.
pub struct Ctx<'a> {
    pub conn: &'a Connection,
    pub config: &'a Config,
    pub session: &'a Session,
}

impl Ctx<'_> {
    pub fn actor(&self) -> Option<String> {
        self.session.user_id.clone()
    }

    /// Appends to the system log. Failure to log never fails the request.
    pub fn audit(&self, action: &str, details: Value) {
        let actor = self.session.user_id.as_deref().unwrap_or("system");
        let details = (!details.is_null()).then(|| details.to_string());
        if let Err(e) = store::logs::append(
            self.conn,
            actor,
            action,
            details.as_deref(),
            self.config.logs.max_entries,
        ) {
            tracing::warn!(action, error = %e, "failed to append system log");
        }
    }
}

pub type HandlerFn = fn(&Ctx<'_>, &Value) -> Result<Value, HandlerErr>;

/// Runs `f` against the open workspace, or answers `no_workspace`.
pub fn run(state: &mut AppState, req: &Request, f: HandlerFn) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let ctx = Ctx {
        conn,
        config: &state.config,
        session: &state.session,
    };
    respond(&req.id, f(&ctx, &req.params))
}

/// Like [`run`], but answers `empty` when no workspace is open. Used by
/// list methods.
pub fn run_list(state: &mut AppState, req: &Request, empty: Value, f: HandlerFn) -> Value {
    if state.db.is_none() {
        return ok(&req.id, empty);
    }
    run(state, req, f)
}

pub fn respond(id: &str, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => {
            tracing::debug!(code = e.code, message = %e.message, "request failed");
            e.response(id)
        }
    }
}

pub fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, HandlerErr> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(params).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

/// Deserializes one field of `params`.
pub fn parse_field<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    serde_json::from_value(v.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid {}: {}", key, e)))
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_opt_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_opt_date(params: &Value, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    match get_opt_str(params, key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key))),
    }
}

/// `params.today` when given, else the local date.
pub fn today(params: &Value) -> Result<NaiveDate, HandlerErr> {
    Ok(get_opt_date(params, "today")?.unwrap_or_else(|| Local::now().date_naive()))
}

/// `params.now` (`HH:MM`) when given, else the local wall-clock time.
pub fn now_hhmm(params: &Value) -> Result<String, HandlerErr> {
    match get_opt_str(params, "now") {
        Some(raw) => Ok(store::leave::normalize_time(&raw)?),
        None => Ok(Local::now().format("%H:%M").to_string()),
    }
}
