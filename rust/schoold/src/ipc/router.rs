use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const FAMILIES: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::schools::try_handle,
    handlers::students::try_handle,
    handlers::attendance::try_handle,
    handlers::dashboard::try_handle,
    handlers::leave::try_handle,
    handlers::gate::try_handle,
    handlers::events::try_handle,
    handlers::behavior::try_handle,
    handlers::academics::try_handle,
    handlers::clinic::try_handle,
    handlers::visitors::try_handle,
    handlers::users::try_handle,
    handlers::session::try_handle,
    handlers::notifications::try_handle,
    handlers::logs::try_handle,
    handlers::backup::try_handle,
    handlers::links::try_handle,
    handlers::print::try_handle,
    handlers::ai::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "dispatch");
    for try_handle in FAMILIES {
        if let Some(resp) = try_handle(state, &req) {
            return resp;
        }
    }

    tracing::debug!(method = %req.method, "unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
