use crate::error::Result;
use crate::model::{LeaveKind, LeaveRequest, LeaveStatus};
use crate::store;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

pub const TOKEN_PREFIX: &str = "GATEPASS:";

pub fn token_for(request_id: &str) -> String {
    format!("{}{}", TOKEN_PREFIX, request_id)
}

/// The request id inside a gate-pass token, if the text is one.
pub fn parse_token(text: &str) -> Option<&str> {
    text.trim()
        .strip_prefix(TOKEN_PREFIX)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCheck {
    Ok,
    InvalidToken,
    NotFound,
    NotEarlyExit,
    NotApproved,
    WrongDate,
    AlreadyUsed,
}

impl GateCheck {
    pub fn is_ok(self) -> bool {
        self == GateCheck::Ok
    }
}

/// Checks a request against the gate rules for `today`, without side effects.
pub fn check(request: &LeaveRequest, today: NaiveDate) -> GateCheck {
    if request.kind != LeaveKind::EarlyExit {
        GateCheck::NotEarlyExit
    } else if request.status != LeaveStatus::Approved {
        GateCheck::NotApproved
    } else if request.date != today {
        GateCheck::WrongDate
    } else if request.actual_exit_time.is_some() {
        GateCheck::AlreadyUsed
    } else {
        GateCheck::Ok
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub valid: bool,
    pub reason: GateCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<LeaveRequest>,
}

impl ScanOutcome {
    fn rejected(reason: GateCheck, request: Option<LeaveRequest>) -> Self {
        Self {
            valid: false,
            reason,
            request,
        }
    }
}

/// Validates a scanned token and, when it passes, stamps the exit time.
/// The stamp is conditional on the column being empty, so of two racing
/// scans only one reports `ok`.
pub fn scan(conn: &Connection, token: &str, today: NaiveDate, now: &str) -> Result<ScanOutcome> {
    let Some(id) = parse_token(token) else {
        return Ok(ScanOutcome::rejected(GateCheck::InvalidToken, None));
    };
    let Some(request) = store::leave::find_request(conn, id)? else {
        return Ok(ScanOutcome::rejected(GateCheck::NotFound, None));
    };
    let reason = check(&request, today);
    if !reason.is_ok() {
        return Ok(ScanOutcome::rejected(reason, Some(request)));
    }
    if !store::leave::mark_exited(conn, id, now)? {
        let request = store::leave::get_request(conn, id)?;
        return Ok(ScanOutcome::rejected(GateCheck::AlreadyUsed, Some(request)));
    }
    tracing::info!(request_id = id, at = now, "gate pass used");
    Ok(ScanOutcome {
        valid: true,
        reason: GateCheck::Ok,
        request: Some(store::leave::get_request(conn, id)?),
    })
}
