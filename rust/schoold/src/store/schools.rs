use super::{new_id, now_stamp};
use crate::error::{Error, Result};
use crate::model::School;
use chrono::{Duration, NaiveDate};
use rusqlite::{Connection, OptionalExtension, Row};

// Student count is denormalized on read so it can never drift.
const SELECT_SCHOOLS: &str = "SELECT
       s.id,
       s.name,
       s.active,
       s.subscription_end,
       (SELECT COUNT(*) FROM students st WHERE st.school_id = s.id) AS student_count
     FROM schools s";

fn map_school(r: &Row<'_>) -> rusqlite::Result<School> {
    Ok(School {
        id: r.get(0)?,
        name: r.get(1)?,
        active: r.get::<_, i64>(2)? != 0,
        subscription_end: r.get(3)?,
        student_count: r.get(4)?,
    })
}

pub fn list_schools(conn: &Connection) -> Result<Vec<School>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY s.name", SELECT_SCHOOLS))?;
    let rows = stmt
        .query_map([], map_school)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn find_school(conn: &Connection, id: &str) -> Result<Option<School>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE s.id = ?", SELECT_SCHOOLS),
            [id],
            map_school,
        )
        .optional()?)
}

pub fn get_school(conn: &Connection, id: &str) -> Result<School> {
    find_school(conn, id)?.ok_or_else(|| Error::not_found("school", id))
}

/// Upsert; an empty id creates a new school.
pub fn save_school(conn: &Connection, mut school: School) -> Result<School> {
    let name = school.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::invalid("school name must not be empty"));
    }
    if school.id.trim().is_empty() {
        school.id = new_id();
    }
    conn.execute(
        "INSERT INTO schools(id, name, active, subscription_end, created_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           active = excluded.active,
           subscription_end = excluded.subscription_end",
        (
            &school.id,
            &name,
            school.active as i64,
            school.subscription_end,
            now_stamp(),
        ),
    )?;
    get_school(conn, &school.id)
}

/// Extends the subscription by `days`, counting from today when the current
/// end date has already passed.
pub fn renew_subscription(
    conn: &Connection,
    id: &str,
    days: i64,
    today: NaiveDate,
) -> Result<School> {
    if days <= 0 {
        return Err(Error::invalid("days must be positive"));
    }
    let mut school = get_school(conn, id)?;
    let base = school
        .subscription_end
        .filter(|end| *end > today)
        .unwrap_or(today);
    school.subscription_end = Some(base + Duration::days(days));
    school.active = true;
    save_school(conn, school)
}

/// Removes the school and everything scoped to it.
pub fn delete_school(conn: &Connection, id: &str) -> Result<()> {
    get_school(conn, id)?;

    let tx = conn.unchecked_transaction()?;
    // Dependency order; there is no ON DELETE CASCADE.
    for sql in [
        "DELETE FROM attendance_records WHERE school_id = ?",
        "DELETE FROM leave_requests WHERE school_id = ?",
        "DELETE FROM behavior_records WHERE school_id = ?",
        "DELETE FROM clinic_visits WHERE school_id = ?",
        "DELETE FROM health_records
         WHERE student_id IN (SELECT id FROM students WHERE school_id = ?)",
        "DELETE FROM schedule_slots WHERE school_id = ?",
        "DELETE FROM subjects WHERE school_id = ?",
        "DELETE FROM events WHERE school_id = ?",
        "DELETE FROM visitors WHERE school_id = ?",
        "DELETE FROM students WHERE school_id = ?",
        "DELETE FROM users WHERE school_id = ?",
        "DELETE FROM schools WHERE id = ?",
    ] {
        tx.execute(sql, [id])?;
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{open_temp, seed_school, seed_student};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn student_count_is_recomputed_on_read() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "North");
        assert_eq!(school.student_count, 0);
        seed_student(&conn, &school.id, "Ali", "5A");
        seed_student(&conn, &school.id, "Sara", "5A");
        assert_eq!(get_school(&conn, &school.id).unwrap().student_count, 2);
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn save_rejects_blank_name() {
        let (conn, ws) = open_temp();
        let err = save_school(
            &conn,
            School {
                id: String::new(),
                name: "  ".into(),
                active: true,
                subscription_end: None,
                student_count: 0,
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "bad_params");
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn renew_counts_from_later_of_today_and_end() {
        let (conn, ws) = open_temp();
        let mut school = seed_school(&conn, "South");
        school.subscription_end = Some(d("2026-01-10"));
        save_school(&conn, school.clone()).unwrap();

        let renewed = renew_subscription(&conn, &school.id, 30, d("2026-02-01")).unwrap();
        assert_eq!(renewed.subscription_end, Some(d("2026-03-03")));

        let again = renew_subscription(&conn, &school.id, 10, d("2026-02-01")).unwrap();
        assert_eq!(again.subscription_end, Some(d("2026-03-13")));
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn delete_cascades_to_students() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "East");
        seed_student(&conn, &school.id, "Omar", "3B");
        delete_school(&conn, &school.id).unwrap();
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))
            .unwrap();
        assert_eq!(left, 0);
        assert!(find_school(&conn, &school.id).unwrap().is_none());
        let _ = std::fs::remove_dir_all(ws);
    }
}
