use super::{new_id, Where};
use crate::error::{Error, Result};
use crate::model::Student;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFilter {
    pub school_id: Option<String>,
    pub grade: Option<String>,
}

const SELECT_STUDENTS: &str =
    "SELECT id, school_id, name, grade, parent_phone, national_id FROM students";

fn map_student(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        school_id: r.get(1)?,
        name: r.get(2)?,
        grade: r.get(3)?,
        parent_phone: r.get(4)?,
        national_id: r.get(5)?,
    })
}

pub fn list_students(conn: &Connection, filter: &StudentFilter) -> Result<Vec<Student>> {
    let mut w = Where::default();
    w.eq("school_id", filter.school_id.clone())
        .eq("grade", filter.grade.clone());
    let sql = format!("{}{} ORDER BY grade, name", SELECT_STUDENTS, w.sql());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(w.values()), map_student)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn find_student(conn: &Connection, id: &str) -> Result<Option<Student>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?", SELECT_STUDENTS),
            [id],
            map_student,
        )
        .optional()?)
}

pub fn get_student(conn: &Connection, id: &str) -> Result<Student> {
    find_student(conn, id)?.ok_or_else(|| Error::not_found("student", id))
}

/// Distinct grades in a school, for roster pickers.
pub fn list_grades(conn: &Connection, school_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT grade FROM students WHERE school_id = ? ORDER BY grade")?;
    let rows = stmt
        .query_map([school_id], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(rows)
}

pub fn save_student(conn: &Connection, mut student: Student) -> Result<Student> {
    student.name = student.name.trim().to_string();
    student.grade = student.grade.trim().to_string();
    if student.name.is_empty() {
        return Err(Error::invalid("student name must not be empty"));
    }
    if student.grade.is_empty() {
        return Err(Error::invalid("grade must not be empty"));
    }
    super::schools::get_school(conn, &student.school_id)?;
    if student.id.trim().is_empty() {
        student.id = new_id();
    }
    student.parent_phone = student
        .parent_phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    conn.execute(
        "INSERT INTO students(id, school_id, name, grade, parent_phone, national_id)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           school_id = excluded.school_id,
           name = excluded.name,
           grade = excluded.grade,
           parent_phone = excluded.parent_phone,
           national_id = excluded.national_id",
        (
            &student.id,
            &student.school_id,
            &student.name,
            &student.grade,
            &student.parent_phone,
            &student.national_id,
        ),
    )?;
    Ok(student)
}

/// Removes the student with its attendance, leave, behavior and health rows.
pub fn delete_student(conn: &Connection, id: &str) -> Result<()> {
    get_student(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    for sql in [
        "DELETE FROM attendance_records WHERE student_id = ?",
        "DELETE FROM leave_requests WHERE student_id = ?",
        "DELETE FROM behavior_records WHERE student_id = ?",
        "DELETE FROM clinic_visits WHERE student_id = ?",
        "DELETE FROM health_records WHERE student_id = ?",
        "UPDATE users SET related_student_id = NULL WHERE related_student_id = ?",
        "DELETE FROM students WHERE id = ?",
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

    #[test]
    fn list_filters_by_school_and_grade() {
        let (conn, ws) = open_temp();
        let a = seed_school(&conn, "A");
        let b = seed_school(&conn, "B");
        seed_student(&conn, &a.id, "Zaid", "5A");
        seed_student(&conn, &a.id, "Huda", "6B");
        seed_student(&conn, &b.id, "Nora", "5A");

        let in_a = list_students(
            &conn,
            &StudentFilter {
                school_id: Some(a.id.clone()),
                grade: None,
            },
        )
        .unwrap();
        assert_eq!(in_a.len(), 2);

        let a5 = list_students(
            &conn,
            &StudentFilter {
                school_id: Some(a.id.clone()),
                grade: Some("5A".into()),
            },
        )
        .unwrap();
        assert_eq!(a5.len(), 1);
        assert_eq!(a5[0].name, "Zaid");
        assert_eq!(list_grades(&conn, &a.id).unwrap(), vec!["5A", "6B"]);
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn save_requires_existing_school() {
        let (conn, ws) = open_temp();
        let err = save_student(
            &conn,
            Student {
                id: String::new(),
                school_id: "missing".into(),
                name: "X".into(),
                grade: "1".into(),
                parent_phone: None,
                national_id: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "not_found");
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn save_overwrites_by_id() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "A");
        let mut s = seed_student(&conn, &school.id, "Layla", "2C");
        s.grade = "3C".into();
        s.parent_phone = Some("   ".into());
        save_student(&conn, s.clone()).unwrap();
        let loaded = get_student(&conn, &s.id).unwrap();
        assert_eq!(loaded.grade, "3C");
        assert_eq!(loaded.parent_phone, None);
        let _ = std::fs::remove_dir_all(ws);
    }
}
