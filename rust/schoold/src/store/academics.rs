use super::{new_id, Where};
use crate::error::{Error, Result};
use crate::model::{ScheduleSlot, Subject};
use rusqlite::{params_from_iter, Connection, ErrorCode, OptionalExtension, Row};

fn map_subject(r: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: r.get(0)?,
        school_id: r.get(1)?,
        name: r.get(2)?,
        grade: r.get(3)?,
    })
}

fn map_slot(r: &Row<'_>) -> rusqlite::Result<ScheduleSlot> {
    Ok(ScheduleSlot {
        id: r.get(0)?,
        school_id: r.get(1)?,
        grade: r.get(2)?,
        day_of_week: r.get(3)?,
        period: r.get(4)?,
        subject_id: r.get(5)?,
        teacher_id: r.get(6)?,
    })
}

pub fn list_subjects(conn: &Connection, school_id: &str) -> Result<Vec<Subject>> {
    let mut stmt = conn.prepare(
        "SELECT id, school_id, name, grade FROM subjects WHERE school_id = ? ORDER BY name",
    )?;
    let rows = stmt
        .query_map([school_id], map_subject)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get_subject(conn: &Connection, id: &str) -> Result<Subject> {
    conn.query_row(
        "SELECT id, school_id, name, grade FROM subjects WHERE id = ?",
        [id],
        map_subject,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("subject", id))
}

pub fn save_subject(conn: &Connection, mut subject: Subject) -> Result<Subject> {
    subject.name = subject.name.trim().to_string();
    if subject.name.is_empty() {
        return Err(Error::invalid("subject name must not be empty"));
    }
    super::schools::get_school(conn, &subject.school_id)?;
    if subject.id.trim().is_empty() {
        subject.id = new_id();
    }
    conn.execute(
        "INSERT INTO subjects(id, school_id, name, grade) VALUES(?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, grade = excluded.grade",
        (&subject.id, &subject.school_id, &subject.name, &subject.grade),
    )?;
    Ok(subject)
}

/// Deletes the subject and the schedule slots that teach it.
pub fn delete_subject(conn: &Connection, id: &str) -> Result<()> {
    get_subject(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM schedule_slots WHERE subject_id = ?", [id])?;
    tx.execute("DELETE FROM subjects WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(())
}

pub fn list_slots(
    conn: &Connection,
    school_id: &str,
    grade: Option<String>,
    teacher_id: Option<String>,
) -> Result<Vec<ScheduleSlot>> {
    let mut w = Where::default();
    w.eq("school_id", Some(school_id.to_string()))
        .eq("grade", grade)
        .eq("teacher_id", teacher_id);
    let sql = format!(
        "SELECT id, school_id, grade, day_of_week, period, subject_id, teacher_id
         FROM schedule_slots{} ORDER BY grade, day_of_week, period",
        w.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(w.values()), map_slot)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Upsert by id. A second slot on the same (grade, day, period) is a conflict.
pub fn save_slot(conn: &Connection, mut slot: ScheduleSlot) -> Result<ScheduleSlot> {
    if slot.day_of_week > 6 {
        return Err(Error::invalid("dayOfWeek must be 0..=6"));
    }
    if slot.period == 0 {
        return Err(Error::invalid("period must be at least 1"));
    }
    slot.grade = slot.grade.trim().to_string();
    if slot.grade.is_empty() {
        return Err(Error::invalid("grade must not be empty"));
    }
    let subject = get_subject(conn, &slot.subject_id)?;
    if subject.school_id != slot.school_id {
        return Err(Error::invalid("subject belongs to another school"));
    }
    if slot.id.trim().is_empty() {
        slot.id = new_id();
    }
    let res = conn.execute(
        "INSERT INTO schedule_slots(id, school_id, grade, day_of_week, period, subject_id, teacher_id)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           grade = excluded.grade,
           day_of_week = excluded.day_of_week,
           period = excluded.period,
           subject_id = excluded.subject_id,
           teacher_id = excluded.teacher_id",
        (
            &slot.id,
            &slot.school_id,
            &slot.grade,
            slot.day_of_week,
            slot.period,
            &slot.subject_id,
            &slot.teacher_id,
        ),
    );
    match res {
        Ok(_) => Ok(slot),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(Error::conflict(format!(
                "grade {} already has a lesson on day {} period {}",
                slot.grade, slot.day_of_week, slot.period
            )))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn delete_slot(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM schedule_slots WHERE id = ?", [id])?;
    if n == 0 {
        return Err(Error::not_found("schedule slot", id));
    }
    Ok(())
}
