//! Typed access to the workspace database.
//!
//! One module per entity collection. Every collection follows the same
//! contract: `list_*` with an optional filter, `save_*` upserting by id (or
//! by composite key for attendance), and `delete_*`. Operations that touch
//! more than one table run inside a single transaction.

pub mod academics;
pub mod attendance;
pub mod behavior;
pub mod clinic;
pub mod events;
pub mod leave;
pub mod logs;
pub mod schools;
pub mod students;
pub mod users;
pub mod visitors;

use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Collects `AND`-joined conditions and their bound values for list queries.
#[derive(Debug, Default)]
pub(crate) struct Where {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Where {
    pub fn eq(&mut self, column: &str, value: Option<impl Into<Value>>) -> &mut Self {
        if let Some(v) = value {
            self.clauses.push(format!("{} = ?", column));
            self.values.push(v.into());
        }
        self
    }

    pub fn cmp(&mut self, column: &str, op: &str, value: Option<impl Into<Value>>) -> &mut Self {
        if let Some(v) = value {
            self.clauses.push(format!("{} {} ?", column, op));
            self.values.push(v.into());
        }
        self
    }

    pub fn raw(&mut self, clause: &str) -> &mut Self {
        self.clauses.push(clause.to_string());
        self
    }

    pub fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

pub(crate) fn date_value(d: chrono::NaiveDate) -> Value {
    Value::Text(d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::model::{School, Student};
    use rusqlite::Connection;

    pub fn open_temp() -> (Connection, std::path::PathBuf) {
        let ws = std::env::temp_dir().join(format!("schoold-store-{}", uuid::Uuid::new_v4()));
        let conn = crate::db::open_db(&ws).expect("open temp db");
        (conn, ws)
    }

    pub fn seed_school(conn: &Connection, name: &str) -> School {
        super::schools::save_school(
            conn,
            School {
                id: String::new(),
                name: name.to_string(),
                active: true,
                subscription_end: None,
                student_count: 0,
            },
        )
        .expect("seed school")
    }

    pub fn seed_student(conn: &Connection, school_id: &str, name: &str, grade: &str) -> Student {
        super::students::save_student(
            conn,
            Student {
                id: String::new(),
                school_id: school_id.to_string(),
                name: name.to_string(),
                grade: grade.to_string(),
                parent_phone: Some("0501234567".to_string()),
                national_id: None,
            },
        )
        .expect("seed student")
    }
}
