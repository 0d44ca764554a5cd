use super::{date_value, new_id};
use crate::error::{Error, Result};
use crate::model::SchoolEvent;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};

fn map_event(r: &Row<'_>) -> rusqlite::Result<SchoolEvent> {
    Ok(SchoolEvent {
        id: r.get(0)?,
        school_id: r.get(1)?,
        title: r.get(2)?,
        date: r.get(3)?,
        end_date: r.get(4)?,
        kind: r.get(5)?,
        description: r.get(6)?,
    })
}

/// Events overlapping the inclusive range; open ends allowed.
pub fn list_events(
    conn: &Connection,
    school_id: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<SchoolEvent>> {
    let mut sql = "SELECT id, school_id, title, date, end_date, kind, description
                   FROM events WHERE school_id = ?"
        .to_string();
    let mut values: Vec<Value> = vec![Value::Text(school_id.to_string())];
    if let Some(f) = from {
        sql.push_str(" AND COALESCE(end_date, date) >= ?");
        values.push(date_value(f));
    }
    if let Some(t) = to {
        sql.push_str(" AND date <= ?");
        values.push(date_value(t));
    }
    sql.push_str(" ORDER BY date, title");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), map_event)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn save_event(conn: &Connection, mut event: SchoolEvent) -> Result<SchoolEvent> {
    event.title = event.title.trim().to_string();
    if event.title.is_empty() {
        return Err(Error::invalid("event title must not be empty"));
    }
    if let Some(end) = event.end_date {
        if end < event.date {
            return Err(Error::invalid("endDate must not be before date"));
        }
    }
    super::schools::get_school(conn, &event.school_id)?;
    if event.id.trim().is_empty() {
        event.id = new_id();
    }
    conn.execute(
        "INSERT INTO events(id, school_id, title, date, end_date, kind, description)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           title = excluded.title,
           date = excluded.date,
           end_date = excluded.end_date,
           kind = excluded.kind,
           description = excluded.description",
        (
            &event.id,
            &event.school_id,
            &event.title,
            event.date,
            event.end_date,
            event.kind,
            &event.description,
        ),
    )?;
    Ok(event)
}

pub fn delete_event(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM events WHERE id = ?", [id])?;
    if n == 0 {
        return Err(Error::not_found("event", id));
    }
    Ok(())
}
