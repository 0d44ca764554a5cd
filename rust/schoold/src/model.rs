use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Implements `as_str`/`parse` for a fieldless enum stored as TEXT.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                $ty::parse(s).ok_or_else(|| FromSqlError::Other(
                    format!("unknown {} value: {}", stringify!($ty), s).into(),
                ))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

text_enum!(AttendanceStatus {
    Present => "present",
    Absent => "absent",
    Late => "late",
    Excused => "excused",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveKind {
    Absence,
    EarlyExit,
}

text_enum!(LeaveKind {
    Absence => "absence",
    EarlyExit => "early_exit",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

text_enum!(LeaveStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Holiday,
    Exam,
    Activity,
    Meeting,
}

text_enum!(EventKind {
    Holiday => "holiday",
    Exam => "exam",
    Activity => "activity",
    Meeting => "meeting",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicOutcome {
    ReturnedToClass,
    SentHome,
    Referred,
}

text_enum!(ClinicOutcome {
    ReturnedToClass => "returned_to_class",
    SentHome => "sent_home",
    Referred => "referred",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    GeneralManager,
    Admin,
    Principal,
    VicePrincipal,
    Staff,
    Teacher,
    Parent,
    Student,
    Nurse,
    Security,
}

text_enum!(Role {
    GeneralManager => "general_manager",
    Admin => "admin",
    Principal => "principal",
    VicePrincipal => "vice_principal",
    Staff => "staff",
    Teacher => "teacher",
    Parent => "parent",
    Student => "student",
    Nurse => "nurse",
    Security => "security",
});

impl Role {
    /// Roles that are bound to one student rather than a whole school.
    pub fn is_student_scoped(self) -> bool {
        matches!(self, Role::Parent | Role::Student)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    pub subscription_end: Option<NaiveDate>,
    #[serde(default)]
    pub student_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default)]
    pub id: String,
    pub school_id: String,
    pub name: String,
    pub grade: String,
    pub parent_phone: Option<String>,
    pub national_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub school_id: String,
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub note: Option<String>,
    pub recorded_by: Option<String>,
}

impl AttendanceRecord {
    /// At most one record exists per (date, student); this is its key.
    pub fn key(date: NaiveDate, student_id: &str) -> String {
        format!("{}-{}", date.format("%Y-%m-%d"), student_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: String,
    pub school_id: String,
    pub student_id: String,
    #[serde(rename = "type")]
    pub kind: LeaveKind,
    pub date: NaiveDate,
    pub reason: String,
    pub exit_time: Option<String>,
    pub status: LeaveStatus,
    pub requested_by: Option<String>,
    pub decided_by: Option<String>,
    pub decided_at: Option<String>,
    pub actual_exit_time: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolEvent {
    #[serde(default)]
    pub id: String,
    pub school_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorRecord {
    #[serde(default)]
    pub id: String,
    pub school_id: String,
    pub student_id: String,
    pub date: NaiveDate,
    pub points: i64,
    pub reason: String,
    pub recorded_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(default)]
    pub id: String,
    pub school_id: String,
    pub name: String,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    #[serde(default)]
    pub id: String,
    pub school_id: String,
    pub grade: String,
    pub day_of_week: u8,
    pub period: u8,
    pub subject_id: String,
    pub teacher_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub student_id: String,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub chronic_conditions: Option<String>,
    pub medications: Option<String>,
    pub emergency_contact: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicVisit {
    pub id: String,
    pub school_id: String,
    pub student_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub complaint: String,
    pub treatment: Option<String>,
    pub outcome: ClinicOutcome,
    pub nurse_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorRecord {
    pub id: String,
    pub school_id: String,
    pub name: String,
    pub id_number: Option<String>,
    pub phone: Option<String>,
    pub purpose: String,
    pub host: Option<String>,
    pub date: NaiveDate,
    pub check_in_time: String,
    pub check_out_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: Role,
    pub school_id: Option<String>,
    pub related_student_id: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: i64,
    pub at: String,
    pub actor: String,
    pub action: String,
    pub details: Option<String>,
}
