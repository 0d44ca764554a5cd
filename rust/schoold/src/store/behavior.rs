use super::{new_id, Where};
use crate::calc;
use crate::error::{Error, Result};
use crate::model::BehaviorRecord;
use chrono::NaiveDate;
use rusqlite::{params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorFilter {
    pub school_id: Option<String>,
    pub student_id: Option<String>,
}

fn map_behavior(r: &Row<'_>) -> rusqlite::Result<BehaviorRecord> {
    Ok(BehaviorRecord {
        id: r.get(0)?,
        school_id: r.get(1)?,
        student_id: r.get(2)?,
        date: r.get(3)?,
        points: r.get(4)?,
        reason: r.get(5)?,
        recorded_by: r.get(6)?,
    })
}

pub fn list_behavior(conn: &Connection, filter: &BehaviorFilter) -> Result<Vec<BehaviorRecord>> {
    let mut w = Where::default();
    w.eq("school_id", filter.school_id.clone())
        .eq("student_id", filter.student_id.clone());
    let sql = format!(
        "SELECT id, school_id, student_id, date, points, reason, recorded_by
         FROM behavior_records{} ORDER BY date DESC, rowid DESC",
        w.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(w.values()), map_behavior)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn add_behavior(
    conn: &Connection,
    student_id: &str,
    date: NaiveDate,
    points: i64,
    reason: &str,
    recorded_by: Option<String>,
) -> Result<BehaviorRecord> {
    if points == 0 {
        return Err(Error::invalid("points must be non-zero"));
    }
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::invalid("reason must not be empty"));
    }
    let student = super::students::get_student(conn, student_id)?;
    let rec = BehaviorRecord {
        id: new_id(),
        school_id: student.school_id,
        student_id: student.id,
        date,
        points,
        reason: reason.to_string(),
        recorded_by,
    };
    conn.execute(
        "INSERT INTO behavior_records(id, school_id, student_id, date, points, reason, recorded_by)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &rec.id,
            &rec.school_id,
            &rec.student_id,
            rec.date,
            rec.points,
            &rec.reason,
            &rec.recorded_by,
        ),
    )?;
    Ok(rec)
}

pub fn delete_behavior(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM behavior_records WHERE id = ?", [id])?;
    if n == 0 {
        return Err(Error::not_found("behavior record", id));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: usize,
    pub student_id: String,
    pub name: String,
    pub grade: String,
    pub score: i64,
}

/// Every student of the school (optionally one grade) ranked by score,
/// highest first; ties by name. Students without records sit at baseline.
pub fn leaderboard(
    conn: &Connection,
    school_id: &str,
    grade: Option<String>,
    limit: Option<usize>,
) -> Result<Vec<LeaderboardRow>> {
    let students = super::students::list_students(
        conn,
        &super::students::StudentFilter {
            school_id: Some(school_id.to_string()),
            grade,
        },
    )?;
    let mut points: HashMap<String, Vec<i64>> = HashMap::new();
    for rec in list_behavior(
        conn,
        &BehaviorFilter {
            school_id: Some(school_id.to_string()),
            student_id: None,
        },
    )? {
        points.entry(rec.student_id).or_default().push(rec.points);
    }

    let mut rows: Vec<LeaderboardRow> = students
        .into_iter()
        .map(|s| {
            let score = calc::behavior_score(points.remove(&s.id).unwrap_or_default());
            LeaderboardRow {
                rank: 0,
                student_id: s.id,
                name: s.name,
                grade: s.grade,
                score,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    if let Some(n) = limit {
        rows.truncate(n);
    }
    Ok(rows)
}

pub fn student_score(conn: &Connection, student_id: &str) -> Result<i64> {
    super::students::get_student(conn, student_id)?;
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(points), 0) FROM behavior_records WHERE student_id = ?",
        [student_id],
        |r| r.get(0),
    )?;
    Ok(calc::behavior_score([total]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{open_temp, seed_school, seed_student};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn leaderboard_ranks_by_score_then_name() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "A");
        let a = seed_student(&conn, &school.id, "Amal", "5A");
        let b = seed_student(&conn, &school.id, "Basel", "5A");
        let c = seed_student(&conn, &school.id, "Car", "5A");
        add_behavior(&conn, &a.id, d("2026-03-01"), 5, "helped", None).unwrap();
        add_behavior(&conn, &b.id, d("2026-03-01"), 10, "project", None).unwrap();
        add_behavior(&conn, &b.id, d("2026-03-02"), -5, "late hw", None).unwrap();
        add_behavior(&conn, &c.id, d("2026-03-02"), -3, "noise", None).unwrap();

        let board = leaderboard(&conn, &school.id, None, None).unwrap();
        let order: Vec<(&str, i64, usize)> = board
            .iter()
            .map(|r| (r.name.as_str(), r.score, r.rank))
            .collect();
        assert_eq!(
            order,
            vec![("Amal", 105, 1), ("Basel", 105, 2), ("Car", 97, 3)]
        );
        assert_eq!(leaderboard(&conn, &school.id, None, Some(1)).unwrap().len(), 1);
        assert_eq!(student_score(&conn, &c.id).unwrap(), 97);
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn zero_points_are_rejected() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "A");
        let a = seed_student(&conn, &school.id, "Amal", "5A");
        let err = add_behavior(&conn, &a.id, d("2026-03-01"), 0, "x", None).unwrap_err();
        assert_eq!(err.code(), "bad_params");
        let _ = std::fs::remove_dir_all(ws);
    }
}
