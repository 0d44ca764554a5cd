use super::{date_value, Where};
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, AttendanceStatus};
use chrono::NaiveDate;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceFilter {
    pub school_id: Option<String>,
    pub student_id: Option<String>,
    pub grade: Option<String>,
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

const SELECT_RECORDS: &str = "SELECT a.id, a.school_id, a.student_id, a.date, a.status, a.note, a.recorded_by
     FROM attendance_records a";

fn map_record(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: r.get(0)?,
        school_id: r.get(1)?,
        student_id: r.get(2)?,
        date: r.get(3)?,
        status: r.get(4)?,
        note: r.get(5)?,
        recorded_by: r.get(6)?,
    })
}

pub fn list_records(conn: &Connection, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>> {
    let mut w = Where::default();
    w.eq("a.school_id", filter.school_id.clone())
        .eq("a.student_id", filter.student_id.clone())
        .eq("a.date", filter.date.map(date_value))
        .cmp("a.date", ">=", filter.from.map(date_value))
        .cmp("a.date", "<=", filter.to.map(date_value));
    let mut sql = SELECT_RECORDS.to_string();
    if let Some(grade) = filter.grade.clone() {
        sql.push_str(" JOIN students s ON s.id = a.student_id");
        w.eq("s.grade", Some(grade));
    }
    sql.push_str(&w.sql());
    sql.push_str(" ORDER BY a.date, a.student_id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(w.values()), map_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn find_record(
    conn: &Connection,
    student_id: &str,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE a.id = ?", SELECT_RECORDS),
            [AttendanceRecord::key(date, student_id)],
            map_record,
        )
        .optional()?)
}

/// Overwrite-on-save: the record key is derived from (date, student), so a
/// second save for the same day replaces the first.
pub fn save_record(
    conn: &Connection,
    student_id: &str,
    date: NaiveDate,
    status: AttendanceStatus,
    note: Option<String>,
    recorded_by: Option<String>,
) -> Result<AttendanceRecord> {
    let student = super::students::get_student(conn, student_id)?;
    let record = AttendanceRecord {
        id: AttendanceRecord::key(date, &student.id),
        school_id: student.school_id,
        student_id: student.id,
        date,
        status,
        note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        recorded_by,
    };
    conn.execute(
        "INSERT INTO attendance_records(id, school_id, student_id, date, status, note, recorded_by)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           status = excluded.status,
           note = excluded.note,
           recorded_by = excluded.recorded_by",
        (
            &record.id,
            &record.school_id,
            &record.student_id,
            record.date,
            record.status,
            &record.note,
            &record.recorded_by,
        ),
    )?;
    Ok(record)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkMark {
    pub student_id: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub note: Option<String>,
}

/// Marks many students for one date in a single transaction. Unknown
/// students are skipped and reported back.
pub fn save_bulk(
    conn: &Connection,
    date: NaiveDate,
    marks: &[BulkMark],
    recorded_by: Option<String>,
) -> Result<(Vec<AttendanceRecord>, Vec<String>)> {
    let tx = conn.unchecked_transaction()?;
    let mut saved = Vec::with_capacity(marks.len());
    let mut skipped = Vec::new();
    for mark in marks {
        match save_record(
            &tx,
            &mark.student_id,
            date,
            mark.status,
            mark.note.clone(),
            recorded_by.clone(),
        ) {
            Ok(rec) => saved.push(rec),
            Err(Error::NotFound { .. }) => skipped.push(mark.student_id.clone()),
            Err(e) => return Err(e),
        }
    }
    tx.commit()?;
    Ok((saved, skipped))
}

pub fn delete_record(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM attendance_records WHERE id = ?", [id])?;
    if n == 0 {
        return Err(Error::not_found("attendance record", id));
    }
    Ok(())
}
