use super::{date_value, new_id, now_stamp, Where};
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, AttendanceStatus, LeaveKind, LeaveRequest, LeaveStatus};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveFilter {
    pub school_id: Option<String>,
    pub student_id: Option<String>,
    pub status: Option<LeaveStatus>,
    #[serde(rename = "type")]
    pub kind: Option<LeaveKind>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLeaveRequest {
    pub student_id: String,
    #[serde(rename = "type")]
    pub kind: LeaveKind,
    pub date: NaiveDate,
    pub reason: String,
    #[serde(default)]
    pub exit_time: Option<String>,
}

const SELECT_REQUESTS: &str = "SELECT id, school_id, student_id, kind, date, reason, exit_time, status,
            requested_by, decided_by, decided_at, actual_exit_time, created_at
     FROM leave_requests";

fn map_request(r: &Row<'_>) -> rusqlite::Result<LeaveRequest> {
    Ok(LeaveRequest {
        id: r.get(0)?,
        school_id: r.get(1)?,
        student_id: r.get(2)?,
        kind: r.get(3)?,
        date: r.get(4)?,
        reason: r.get(5)?,
        exit_time: r.get(6)?,
        status: r.get(7)?,
        requested_by: r.get(8)?,
        decided_by: r.get(9)?,
        decided_at: r.get(10)?,
        actual_exit_time: r.get(11)?,
        created_at: r.get(12)?,
    })
}

pub fn list_requests(conn: &Connection, filter: &LeaveFilter) -> Result<Vec<LeaveRequest>> {
    let mut w = Where::default();
    w.eq("school_id", filter.school_id.clone())
        .eq("student_id", filter.student_id.clone())
        .eq("status", filter.status.map(|s| s.as_str().to_string()))
        .eq("kind", filter.kind.map(|k| k.as_str().to_string()))
        .eq("date", filter.date.map(date_value));
    let sql = format!(
        "{}{} ORDER BY date DESC, created_at DESC",
        SELECT_REQUESTS,
        w.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(w.values()), map_request)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn find_request(conn: &Connection, id: &str) -> Result<Option<LeaveRequest>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", SELECT_REQUESTS),
            [id],
            map_request,
        )
        .optional()?)
}

pub fn get_request(conn: &Connection, id: &str) -> Result<LeaveRequest> {
    find_request(conn, id)?.ok_or_else(|| Error::not_found("leave request", id))
}

pub(crate) fn normalize_time(raw: &str) -> Result<String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| Error::invalid(format!("time must be HH:MM, got {:?}", raw)))
}

pub fn create_request(
    conn: &Connection,
    input: NewLeaveRequest,
    requested_by: Option<String>,
) -> Result<LeaveRequest> {
    let student = super::students::get_student(conn, &input.student_id)?;
    let reason = input.reason.trim().to_string();
    if reason.is_empty() {
        return Err(Error::invalid("reason must not be empty"));
    }
    let exit_time = match (input.kind, input.exit_time.as_deref()) {
        (LeaveKind::EarlyExit, Some(t)) => Some(normalize_time(t)?),
        (LeaveKind::EarlyExit, None) => {
            return Err(Error::invalid("early_exit requests need exitTime"))
        }
        (LeaveKind::Absence, _) => None,
    };
    let req = LeaveRequest {
        id: new_id(),
        school_id: student.school_id,
        student_id: student.id,
        kind: input.kind,
        date: input.date,
        reason,
        exit_time,
        status: LeaveStatus::Pending,
        requested_by,
        decided_by: None,
        decided_at: None,
        actual_exit_time: None,
        created_at: now_stamp(),
    };
    insert_request(conn, &req)?;
    Ok(req)
}

pub(crate) fn insert_request(conn: &Connection, req: &LeaveRequest) -> Result<()> {
    conn.execute(
        "INSERT INTO leave_requests(id, school_id, student_id, kind, date, reason, exit_time,
                                    status, requested_by, decided_by, decided_at,
                                    actual_exit_time, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &req.id,
            &req.school_id,
            &req.student_id,
            req.kind,
            req.date,
            &req.reason,
            &req.exit_time,
            req.status,
            &req.requested_by,
            &req.decided_by,
            &req.decided_at,
            &req.actual_exit_time,
            &req.created_at,
        ),
    )?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub request: LeaveRequest,
    /// The EXCUSED record written when an absence request is approved.
    pub excused: Option<AttendanceRecord>,
}

/// Approves or rejects a pending request. Approving an absence request also
/// writes an EXCUSED attendance record for that day, in the same transaction.
pub fn decide_request(
    conn: &Connection,
    id: &str,
    decision: LeaveStatus,
    decided_by: Option<String>,
) -> Result<Decision> {
    if decision == LeaveStatus::Pending {
        return Err(Error::invalid("decision must be approved or rejected"));
    }
    let current = get_request(conn, id)?;
    if current.status != LeaveStatus::Pending {
        return Err(Error::conflict(format!(
            "leave request already {}",
            current.status
        )));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE leave_requests SET status = ?, decided_by = ?, decided_at = ? WHERE id = ?",
        (decision, &decided_by, now_stamp(), id),
    )?;
    let excused = if decision == LeaveStatus::Approved && current.kind == LeaveKind::Absence {
        Some(super::attendance::save_record(
            &tx,
            &current.student_id,
            current.date,
            AttendanceStatus::Excused,
            Some(current.reason.clone()),
            decided_by.clone(),
        )?)
    } else {
        None
    };
    let request = get_request(&tx, id)?;
    tx.commit()?;
    Ok(Decision { request, excused })
}

/// Sets `actual_exit_time` only if unset. Returns false when another scan
/// got there first.
pub fn mark_exited(conn: &Connection, id: &str, at: &str) -> Result<bool> {
    let n = conn.execute(
        "UPDATE leave_requests SET actual_exit_time = ?
         WHERE id = ? AND actual_exit_time IS NULL",
        (at, id),
    )?;
    Ok(n == 1)
}

pub fn delete_request(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM leave_requests WHERE id = ?", [id])?;
    if n == 0 {
        return Err(Error::not_found("leave request", id));
    }
    Ok(())
}
