use super::{date_value, new_id, now_stamp, Where};
use crate::error::{Error, Result};
use crate::model::{
    ClinicOutcome, ClinicVisit, HealthRecord, LeaveKind, LeaveRequest, LeaveStatus,
};
use chrono::NaiveDate;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;

pub fn get_health(conn: &Connection, student_id: &str) -> Result<Option<HealthRecord>> {
    Ok(conn
        .query_row(
            "SELECT student_id, blood_type, allergies, chronic_conditions, medications,
                    emergency_contact, notes, updated_at
             FROM health_records WHERE student_id = ?",
            [student_id],
            |r| {
                Ok(HealthRecord {
                    student_id: r.get(0)?,
                    blood_type: r.get(1)?,
                    allergies: r.get(2)?,
                    chronic_conditions: r.get(3)?,
                    medications: r.get(4)?,
                    emergency_contact: r.get(5)?,
                    notes: r.get(6)?,
                    updated_at: r.get(7)?,
                })
            },
        )
        .optional()?)
}

/// Upsert keyed by student.
pub fn save_health(conn: &Connection, mut record: HealthRecord) -> Result<HealthRecord> {
    super::students::get_student(conn, &record.student_id)?;
    record.updated_at = now_stamp();
    conn.execute(
        "INSERT INTO health_records(student_id, blood_type, allergies, chronic_conditions,
                                    medications, emergency_contact, notes, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id) DO UPDATE SET
           blood_type = excluded.blood_type,
           allergies = excluded.allergies,
           chronic_conditions = excluded.chronic_conditions,
           medications = excluded.medications,
           emergency_contact = excluded.emergency_contact,
           notes = excluded.notes,
           updated_at = excluded.updated_at",
        (
            &record.student_id,
            &record.blood_type,
            &record.allergies,
            &record.chronic_conditions,
            &record.medications,
            &record.emergency_contact,
            &record.notes,
            &record.updated_at,
        ),
    )?;
    Ok(record)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitFilter {
    pub school_id: Option<String>,
    pub student_id: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisit {
    pub student_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub complaint: String,
    #[serde(default)]
    pub treatment: Option<String>,
    pub outcome: ClinicOutcome,
}

const SELECT_VISITS: &str = "SELECT id, school_id, student_id, date, time, complaint, treatment, outcome, nurse_id
     FROM clinic_visits";

fn map_visit(r: &Row<'_>) -> rusqlite::Result<ClinicVisit> {
    Ok(ClinicVisit {
        id: r.get(0)?,
        school_id: r.get(1)?,
        student_id: r.get(2)?,
        date: r.get(3)?,
        time: r.get(4)?,
        complaint: r.get(5)?,
        treatment: r.get(6)?,
        outcome: r.get(7)?,
        nurse_id: r.get(8)?,
    })
}

pub fn list_visits(conn: &Connection, filter: &VisitFilter) -> Result<Vec<ClinicVisit>> {
    let mut w = Where::default();
    w.eq("school_id", filter.school_id.clone())
        .eq("student_id", filter.student_id.clone())
        .eq("date", filter.date.map(date_value));
    let sql = format!("{}{} ORDER BY date DESC, time DESC", SELECT_VISITS, w.sql());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(w.values()), map_visit)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct RecordedVisit {
    pub visit: ClinicVisit,
    /// Filed when the nurse sends the student home.
    pub exit_pass: Option<LeaveRequest>,
}

/// Records a visit. A `sent_home` outcome also files an already-approved
/// early-exit request for the visit time so security can release the student.
pub fn record_visit(
    conn: &Connection,
    input: NewVisit,
    nurse_id: Option<String>,
) -> Result<RecordedVisit> {
    let student = super::students::get_student(conn, &input.student_id)?;
    let complaint = input.complaint.trim().to_string();
    if complaint.is_empty() {
        return Err(Error::invalid("complaint must not be empty"));
    }
    let time = super::leave::normalize_time(&input.time)?;
    let visit = ClinicVisit {
        id: new_id(),
        school_id: student.school_id.clone(),
        student_id: student.id.clone(),
        date: input.date,
        time: time.clone(),
        complaint,
        treatment: input.treatment,
        outcome: input.outcome,
        nurse_id,
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO clinic_visits(id, school_id, student_id, date, time, complaint, treatment, outcome, nurse_id)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &visit.id,
            &visit.school_id,
            &visit.student_id,
            visit.date,
            &visit.time,
            &visit.complaint,
            &visit.treatment,
            visit.outcome,
            &visit.nurse_id,
        ),
    )?;
    let exit_pass = if visit.outcome == ClinicOutcome::SentHome {
        let stamp = now_stamp();
        let pass = LeaveRequest {
            id: new_id(),
            school_id: student.school_id,
            student_id: student.id,
            kind: LeaveKind::EarlyExit,
            date: visit.date,
            reason: format!("clinic: {}", visit.complaint),
            exit_time: Some(time),
            status: LeaveStatus::Approved,
            requested_by: visit.nurse_id.clone(),
            decided_by: visit.nurse_id.clone(),
            decided_at: Some(stamp.clone()),
            actual_exit_time: None,
            created_at: stamp,
        };
        super::leave::insert_request(&tx, &pass)?;
        Some(pass)
    } else {
        None
    };
    tx.commit()?;
    Ok(RecordedVisit { visit, exit_pass })
}

pub fn delete_visit(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM clinic_visits WHERE id = ?", [id])?;
    if n == 0 {
        return Err(Error::not_found("clinic visit", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::leave::{list_requests, LeaveFilter};
    use crate::store::test_support::{open_temp, seed_school, seed_student};

    fn visit(student_id: &str, outcome: ClinicOutcome) -> NewVisit {
        NewVisit {
            student_id: student_id.into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            time: "10:15".into(),
            complaint: "headache".into(),
            treatment: Some("rest".into()),
            outcome,
        }
    }

    #[test]
    fn sent_home_files_approved_exit_pass() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "A");
        let st = seed_student(&conn, &school.id, "Ali", "5A");
        let rec = record_visit(&conn, visit(&st.id, ClinicOutcome::SentHome), Some("n1".into()))
            .unwrap();
        let pass = rec.exit_pass.expect("exit pass");
        assert_eq!(pass.status, LeaveStatus::Approved);
        assert_eq!(pass.kind, LeaveKind::EarlyExit);
        assert_eq!(pass.exit_time.as_deref(), Some("10:15"));
        assert_eq!(list_requests(&conn, &LeaveFilter::default()).unwrap().len(), 1);
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn returned_to_class_files_nothing_else() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "A");
        let st = seed_student(&conn, &school.id, "Ali", "5A");
        let rec = record_visit(&conn, visit(&st.id, ClinicOutcome::ReturnedToClass), None).unwrap();
        assert!(rec.exit_pass.is_none());
        assert!(list_requests(&conn, &LeaveFilter::default()).unwrap().is_empty());
        let visits = list_visits(
            &conn,
            &VisitFilter {
                student_id: Some(st.id.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].complaint, "headache");
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn health_record_upserts_by_student() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "A");
        let st = seed_student(&conn, &school.id, "Ali", "5A");
        assert!(get_health(&conn, &st.id).unwrap().is_none());
        save_health(
            &conn,
            HealthRecord {
                student_id: st.id.clone(),
                blood_type: Some("O+".into()),
                ..Default::default()
            },
        )
        .unwrap();
        save_health(
            &conn,
            HealthRecord {
                student_id: st.id.clone(),
                blood_type: Some("O+".into()),
                allergies: Some("peanuts".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let h = get_health(&conn, &st.id).unwrap().unwrap();
        assert_eq!(h.allergies.as_deref(), Some("peanuts"));
        assert!(!h.updated_at.is_empty());
        let _ = std::fs::remove_dir_all(ws);
    }
}
