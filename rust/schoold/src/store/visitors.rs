use super::{date_value, new_id, Where};
use crate::error::{Error, Result};
use crate::model::VisitorRecord;
use chrono::NaiveDate;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorFilter {
    pub school_id: Option<String>,
    pub date: Option<NaiveDate>,
    /// Only visitors who have not checked out.
    #[serde(default)]
    pub on_site: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisitor {
    pub school_id: String,
    pub name: String,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub purpose: String,
    #[serde(default)]
    pub host: Option<String>,
}

const SELECT_VISITORS: &str = "SELECT id, school_id, name, id_number, phone, purpose, host, date,
            check_in_time, check_out_time
     FROM visitors";

fn map_visitor(r: &Row<'_>) -> rusqlite::Result<VisitorRecord> {
    Ok(VisitorRecord {
        id: r.get(0)?,
        school_id: r.get(1)?,
        name: r.get(2)?,
        id_number: r.get(3)?,
        phone: r.get(4)?,
        purpose: r.get(5)?,
        host: r.get(6)?,
        date: r.get(7)?,
        check_in_time: r.get(8)?,
        check_out_time: r.get(9)?,
    })
}

pub fn list_visitors(conn: &Connection, filter: &VisitorFilter) -> Result<Vec<VisitorRecord>> {
    let mut w = Where::default();
    w.eq("school_id", filter.school_id.clone())
        .eq("date", filter.date.map(date_value));
    if filter.on_site {
        w.raw("check_out_time IS NULL");
    }
    let sql = format!(
        "{}{} ORDER BY date DESC, check_in_time DESC",
        SELECT_VISITORS,
        w.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(w.values()), map_visitor)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get_visitor(conn: &Connection, id: &str) -> Result<VisitorRecord> {
    conn.query_row(
        &format!("{} WHERE id = ?", SELECT_VISITORS),
        [id],
        map_visitor,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("visitor", id))
}

pub fn check_in(
    conn: &Connection,
    input: NewVisitor,
    date: NaiveDate,
    time: &str,
) -> Result<VisitorRecord> {
    let name = input.name.trim().to_string();
    let purpose = input.purpose.trim().to_string();
    if name.is_empty() || purpose.is_empty() {
        return Err(Error::invalid("visitor name and purpose are required"));
    }
    super::schools::get_school(conn, &input.school_id)?;
    let rec = VisitorRecord {
        id: new_id(),
        school_id: input.school_id,
        name,
        id_number: input.id_number,
        phone: input.phone,
        purpose,
        host: input.host,
        date,
        check_in_time: super::leave::normalize_time(time)?,
        check_out_time: None,
    };
    conn.execute(
        "INSERT INTO visitors(id, school_id, name, id_number, phone, purpose, host, date,
                              check_in_time, check_out_time)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)",
        (
            &rec.id,
            &rec.school_id,
            &rec.name,
            &rec.id_number,
            &rec.phone,
            &rec.purpose,
            &rec.host,
            rec.date,
            &rec.check_in_time,
        ),
    )?;
    Ok(rec)
}

/// Terminal transition; a second check-out is a conflict.
pub fn check_out(conn: &Connection, id: &str, time: &str) -> Result<VisitorRecord> {
    let time = super::leave::normalize_time(time)?;
    let n = conn.execute(
        "UPDATE visitors SET check_out_time = ? WHERE id = ? AND check_out_time IS NULL",
        (&time, id),
    )?;
    if n == 0 {
        let existing = get_visitor(conn, id)?;
        return Err(Error::conflict(format!(
            "visitor already checked out at {}",
            existing.check_out_time.unwrap_or_default()
        )));
    }
    get_visitor(conn, id)
}

pub fn delete_visitor(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM visitors WHERE id = ?", [id])?;
    if n == 0 {
        return Err(Error::not_found("visitor", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{open_temp, seed_school};

    fn new_visitor(school_id: &str) -> NewVisitor {
        NewVisitor {
            school_id: school_id.into(),
            name: "Khalid".into(),
            id_number: Some("1029384756".into()),
            phone: None,
            purpose: "meeting".into(),
            host: Some("principal".into()),
        }
    }

    #[test]
    fn check_out_is_terminal() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "A");
        let day = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let v = check_in(&conn, new_visitor(&school.id), day, "08:40").unwrap();

        let on_site = list_visitors(
            &conn,
            &VisitorFilter {
                school_id: Some(school.id.clone()),
                date: Some(day),
                on_site: true,
            },
        )
        .unwrap();
        assert_eq!(on_site.len(), 1);

        let out = check_out(&conn, &v.id, "09:10").unwrap();
        assert_eq!(out.check_out_time.as_deref(), Some("09:10"));
        let err = check_out(&conn, &v.id, "09:20").unwrap_err();
        assert_eq!(err.code(), "conflict");

        let on_site = list_visitors(
            &conn,
            &VisitorFilter {
                school_id: Some(school.id.clone()),
                date: None,
                on_site: true,
            },
        )
        .unwrap();
        assert!(on_site.is_empty());
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn check_out_unknown_visitor_is_not_found() {
        let (conn, ws) = open_temp();
        assert_eq!(
            check_out(&conn, "missing", "10:00").unwrap_err().code(),
            "not_found"
        );
        let _ = std::fs::remove_dir_all(ws);
    }
}
