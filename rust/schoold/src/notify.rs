//! Per-role advisory notifications.
//!
//! Everything here is a pure function of an in-memory [`Snapshot`] so the
//! rules can be exercised without a database. The handler loads the snapshot
//! scoped to the user's school (or every school for general managers).

use crate::calc::{self, AttendanceTally, RiskRules};
use crate::config::Config;
use crate::model::{
    AttendanceRecord, AttendanceStatus, LeaveKind, LeaveRequest, LeaveStatus, Role, School,
    Student, User,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub code: &'static str,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Rules {
    pub risk: RiskRules,
    pub streak_days: usize,
    pub subscription_warning_days: i64,
}

impl From<&Config> for Rules {
    fn from(c: &Config) -> Self {
        Self {
            risk: RiskRules {
                threshold: c.attendance.at_risk_threshold,
                min_records: c.attendance.min_records_for_risk,
            },
            streak_days: c.attendance.absence_streak_days,
            subscription_warning_days: c.notifications.subscription_warning_days,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub schools: &'a [School],
    pub students: &'a [Student],
    pub records: &'a [AttendanceRecord],
    pub leaves: &'a [LeaveRequest],
}

impl<'a> Snapshot<'a> {
    fn records_by_student(&self) -> BTreeMap<&'a str, Vec<&'a AttendanceRecord>> {
        let mut map: BTreeMap<&str, Vec<&AttendanceRecord>> = BTreeMap::new();
        for r in self.records {
            map.entry(r.student_id.as_str()).or_default().push(r);
        }
        map
    }

    fn student(&self, id: &str) -> Option<&'a Student> {
        self.students.iter().find(|s| s.id == id)
    }
}

pub fn subscription_notice(
    school: &School,
    today: NaiveDate,
    warning_days: i64,
) -> Option<Notification> {
    let end = school.subscription_end?;
    let days_left = (end - today).num_days();
    let (code, severity, title, message) = if days_left <= 0 {
        (
            "subscription_expired",
            Severity::Danger,
            "انتهى الاشتراك",
            format!("انتهى اشتراك {} بتاريخ {}.", school.name, end),
        )
    } else if days_left <= warning_days {
        (
            "subscription_expiring",
            Severity::Warning,
            "الاشتراك على وشك الانتهاء",
            format!(
                "ينتهي اشتراك {} خلال {} يوم.",
                school.name, days_left
            ),
        )
    } else {
        return None;
    };
    Some(Notification {
        id: format!("{}-{}", code, school.id),
        code,
        severity,
        title: title.to_string(),
        message,
        date: today,
        school_id: Some(school.id.clone()),
        student_id: None,
    })
}

fn pending_leaves_notice(snap: &Snapshot<'_>, today: NaiveDate) -> Option<Notification> {
    let pending = snap
        .leaves
        .iter()
        .filter(|l| l.status == LeaveStatus::Pending)
        .count();
    (pending > 0).then(|| Notification {
        id: "pending_leaves".to_string(),
        code: "pending_leaves",
        severity: Severity::Info,
        title: "طلبات استئذان معلقة".to_string(),
        message: format!("يوجد {} طلب استئذان بانتظار القرار.", pending),
        date: today,
        school_id: None,
        student_id: None,
    })
}

/// Students who are at risk under `rules`, lowest rate first.
pub fn at_risk_students<'a>(
    snap: &Snapshot<'a>,
    rules: RiskRules,
) -> Vec<(&'a str, AttendanceTally)> {
    let mut out: Vec<(&str, AttendanceTally)> = snap
        .records_by_student()
        .into_iter()
        .map(|(sid, recs)| (sid, AttendanceTally::from_records(recs)))
        .filter(|(_, t)| calc::is_at_risk(t, rules))
        .collect();
    out.sort_by_key(|(_, t)| t.rate());
    out
}

fn at_risk_notice(snap: &Snapshot<'_>, rules: &Rules, today: NaiveDate) -> Option<Notification> {
    let count = at_risk_students(snap, rules.risk).len();
    (count > 0).then(|| Notification {
        id: "at_risk_students".to_string(),
        code: "at_risk_students",
        severity: Severity::Warning,
        title: "طلاب معرضون للخطر".to_string(),
        message: format!(
            "نسبة حضور {} طالب أقل من {}%.",
            count, rules.risk.threshold
        ),
        date: today,
        school_id: None,
        student_id: None,
    })
}

/// Student ids whose trailing `window` records are all absences, with the
/// date of the latest absence.
pub fn absence_streaks<'a>(snap: &Snapshot<'a>, window: usize) -> Vec<(&'a str, NaiveDate)> {
    snap.records_by_student()
        .into_iter()
        .filter(|(_, recs)| calc::has_absence_streak(recs, window))
        .filter_map(|(sid, recs)| recs.iter().map(|r| r.date).max().map(|d| (sid, d)))
        .collect()
}

fn streak_notices(snap: &Snapshot<'_>, window: usize) -> Vec<Notification> {
    absence_streaks(snap, window)
        .into_iter()
        .map(|(sid, last)| {
            let name = snap.student(sid).map_or(sid, |s| s.name.as_str());
            Notification {
                id: format!("absence_streak-{}", sid),
                code: "absence_streak",
                severity: Severity::Danger,
                title: "غياب متتالٍ".to_string(),
                message: format!("تغيب {} لمدة {} أيام متتالية.", name, window),
                date: last,
                school_id: None,
                student_id: Some(sid.to_string()),
            }
        })
        .collect()
}

fn today_status_notice(
    snap: &Snapshot<'_>,
    student_id: &str,
    today: NaiveDate,
) -> Option<Notification> {
    let rec = snap
        .records
        .iter()
        .find(|r| r.student_id == student_id && r.date == today)?;
    let name = snap
        .student(student_id)
        .map_or(student_id, |s| s.name.as_str());
    let (severity, text) = match rec.status {
        AttendanceStatus::Present => (Severity::Success, "حاضر اليوم"),
        AttendanceStatus::Late => (Severity::Warning, "متأخر اليوم"),
        AttendanceStatus::Excused => (Severity::Info, "غائب بعذر اليوم"),
        AttendanceStatus::Absent => (Severity::Danger, "غائب اليوم"),
    };
    Some(Notification {
        id: format!("today_status-{}", student_id),
        code: "today_status",
        severity,
        title: "حضور اليوم".to_string(),
        message: format!("{}: {}.", name, text),
        date: today,
        school_id: None,
        student_id: Some(student_id.to_string()),
    })
}

fn kind_label(kind: LeaveKind) -> &'static str {
    match kind {
        LeaveKind::Absence => "الغياب",
        LeaveKind::EarlyExit => "الخروج المبكر",
    }
}

fn decision_label(status: LeaveStatus) -> &'static str {
    match status {
        LeaveStatus::Approved => "تمت الموافقة على",
        LeaveStatus::Rejected => "تم رفض",
        LeaveStatus::Pending => "لم يُبت في",
    }
}

fn leave_decided_notices(
    snap: &Snapshot<'_>,
    student_id: &str,
    today: NaiveDate,
) -> Vec<Notification> {
    snap.leaves
        .iter()
        .filter(|l| l.student_id == student_id && l.date == today)
        .filter(|l| l.status != LeaveStatus::Pending)
        .map(|l| Notification {
            id: format!("leave_decided-{}", l.id),
            code: "leave_decided",
            severity: if l.status == LeaveStatus::Approved {
                Severity::Success
            } else {
                Severity::Warning
            },
            title: "تم البت في طلب الاستئذان".to_string(),
            message: format!(
                "{} طلب {} لهذا اليوم.",
                decision_label(l.status),
                kind_label(l.kind)
            ),
            date: today,
            school_id: None,
            student_id: Some(student_id.to_string()),
        })
        .collect()
}

fn gate_pass_notice(snap: &Snapshot<'_>, today: NaiveDate) -> Option<Notification> {
    let waiting = snap
        .leaves
        .iter()
        .filter(|l| {
            l.kind == LeaveKind::EarlyExit
                && l.status == LeaveStatus::Approved
                && l.date == today
                && l.actual_exit_time.is_none()
        })
        .count();
    (waiting > 0).then(|| Notification {
        id: "gate_passes_today".to_string(),
        code: "gate_passes_today",
        severity: Severity::Info,
        title: "خروج مبكر اليوم".to_string(),
        message: format!("{} تصريح خروج معتمد لم يُمسح بعد.", waiting),
        date: today,
        school_id: None,
        student_id: None,
    })
}

/// Builds the notification list for `user`, newest first. Ties keep rule
/// order.
pub fn for_user(
    user: &User,
    snap: &Snapshot<'_>,
    rules: &Rules,
    today: NaiveDate,
) -> Vec<Notification> {
    let mut out: Vec<Notification> = Vec::new();
    match user.role {
        Role::GeneralManager | Role::Admin => {
            out.extend(
                snap.schools
                    .iter()
                    .filter_map(|s| subscription_notice(s, today, rules.subscription_warning_days)),
            );
        }
        Role::Principal | Role::VicePrincipal => {
            if let Some(school_id) = user.school_id.as_deref() {
                out.extend(
                    snap.schools
                        .iter()
                        .filter(|s| s.id == school_id)
                        .filter_map(|s| {
                            subscription_notice(s, today, rules.subscription_warning_days)
                        }),
                );
            }
            out.extend(pending_leaves_notice(snap, today));
            out.extend(at_risk_notice(snap, rules, today));
            out.extend(streak_notices(snap, rules.streak_days));
        }
        Role::Staff | Role::Teacher => {
            out.extend(at_risk_notice(snap, rules, today));
            out.extend(streak_notices(snap, rules.streak_days));
        }
        Role::Parent | Role::Student => {
            if let Some(sid) = user.related_student_id.as_deref() {
                out.extend(today_status_notice(snap, sid, today));
                out.extend(leave_decided_notices(snap, sid, today));
                out.extend(
                    streak_notices(snap, rules.streak_days)
                        .into_iter()
                        .filter(|n| n.student_id.as_deref() == Some(sid)),
                );
            }
        }
        Role::Security => {
            out.extend(gate_pass_notice(snap, today));
        }
        Role::Nurse => {}
    }
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn school(id: &str, end: Option<&str>) -> School {
        School {
            id: id.into(),
            name: format!("School {}", id),
            active: true,
            subscription_end: end.map(d),
            student_count: 0,
        }
    }

    fn student(id: &str) -> Student {
        Student {
            id: id.into(),
            school_id: "s1".into(),
            name: format!("Student {}", id),
            grade: "5A".into(),
            parent_phone: None,
            national_id: None,
        }
    }

    fn rec(student_id: &str, date: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: AttendanceRecord::key(d(date), student_id),
            school_id: "s1".into(),
            student_id: student_id.into(),
            date: d(date),
            status,
            note: None,
            recorded_by: None,
        }
    }

    fn user(role: Role) -> User {
        User {
            id: "u1".into(),
            username: "u".into(),
            name: "U".into(),
            role,
            school_id: Some("s1".into()),
            related_student_id: Some("a".into()),
            active: true,
        }
    }

    fn rules() -> Rules {
        Rules::from(&Config::default())
    }

    fn leave(status: LeaveStatus, kind: LeaveKind, date: &str) -> LeaveRequest {
        LeaveRequest {
            id: format!("l-{}-{}", status, date),
            school_id: "s1".into(),
            student_id: "a".into(),
            kind,
            date: d(date),
            reason: "r".into(),
            exit_time: None,
            status,
            requested_by: None,
            decided_by: None,
            decided_at: None,
            actual_exit_time: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn subscription_thresholds() {
        let today = d("2026-03-01");
        assert!(subscription_notice(&school("x", Some("2026-05-01")), today, 30).is_none());
        let warn = subscription_notice(&school("x", Some("2026-03-31")), today, 30).unwrap();
        assert_eq!(warn.severity, Severity::Warning);
        assert_eq!(warn.code, "subscription_expiring");
        let expired = subscription_notice(&school("x", Some("2026-03-01")), today, 30).unwrap();
        assert_eq!(expired.severity, Severity::Danger);
        assert_eq!(expired.title, "انتهى الاشتراك");
        assert!(expired.message.contains("2026-03-01"));
        assert!(subscription_notice(&school("x", None), today, 30).is_none());
    }

    #[test]
    fn principal_sees_pending_risk_and_streaks() {
        use AttendanceStatus::*;
        let schools = vec![school("s1", Some("2026-03-10"))];
        let students = vec![student("a"), student("b")];
        let records = vec![
            rec("a", "2026-02-25", Present),
            rec("a", "2026-02-26", Absent),
            rec("a", "2026-02-27", Absent),
            rec("a", "2026-02-28", Absent),
            rec("b", "2026-02-27", Present),
            rec("b", "2026-02-28", Present),
            rec("b", "2026-03-01", Present),
        ];
        let leaves = vec![leave(LeaveStatus::Pending, LeaveKind::Absence, "2026-03-02")];
        let snap = Snapshot {
            schools: &schools,
            students: &students,
            records: &records,
            leaves: &leaves,
        };
        let out = for_user(&user(Role::Principal), &snap, &rules(), d("2026-03-01"));
        let codes: Vec<&str> = out.iter().map(|n| n.code).collect();
        assert_eq!(
            codes,
            vec![
                "subscription_expiring",
                "pending_leaves",
                "at_risk_students",
                "absence_streak"
            ]
        );
        let streak = out.iter().find(|n| n.code == "absence_streak").unwrap();
        assert_eq!(streak.date, d("2026-02-28"));
        assert!(streak.message.contains("Student a"));
    }

    #[test]
    fn fewer_than_three_records_never_flags() {
        use AttendanceStatus::*;
        let students = vec![student("a")];
        let records = vec![rec("a", "2026-02-27", Absent), rec("a", "2026-02-28", Absent)];
        let snap = Snapshot {
            schools: &[],
            students: &students,
            records: &records,
            leaves: &[],
        };
        let out = for_user(&user(Role::Teacher), &snap, &rules(), d("2026-03-01"));
        assert!(out.is_empty());
    }

    #[test]
    fn parent_sees_child_status_for_today() {
        use AttendanceStatus::*;
        let students = vec![student("a"), student("b")];
        let records = vec![rec("a", "2026-03-01", Late), rec("b", "2026-03-01", Absent)];
        let leaves = vec![leave(LeaveStatus::Approved, LeaveKind::EarlyExit, "2026-03-01")];
        let snap = Snapshot {
            schools: &[],
            students: &students,
            records: &records,
            leaves: &leaves,
        };
        let out = for_user(&user(Role::Parent), &snap, &rules(), d("2026-03-01"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].code, "today_status");
        assert_eq!(out[0].severity, Severity::Warning);
        assert_eq!(out[0].student_id.as_deref(), Some("a"));
        assert_eq!(out[1].code, "leave_decided");
        assert_eq!(out[0].title, "حضور اليوم");
        assert!(out[0].message.contains("متأخر"));
        assert!(out[1].message.contains("تمت الموافقة على طلب الخروج المبكر"));
    }

    #[test]
    fn general_manager_sees_every_school_sorted_by_date() {
        let schools = vec![
            school("s1", Some("2026-03-05")),
            school("s2", Some("2026-02-01")),
            school("s3", Some("2027-01-01")),
        ];
        let snap = Snapshot {
            schools: &schools,
            students: &[],
            records: &[],
            leaves: &[],
        };
        let out = for_user(&user(Role::GeneralManager), &snap, &rules(), d("2026-03-01"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].code, "subscription_expiring");
        assert_eq!(out[1].code, "subscription_expired");
    }

    #[test]
    fn security_sees_unscanned_passes() {
        let mut used = leave(LeaveStatus::Approved, LeaveKind::EarlyExit, "2026-03-01");
        used.id = "used".into();
        used.actual_exit_time = Some("10:00".into());
        let leaves = vec![
            leave(LeaveStatus::Approved, LeaveKind::EarlyExit, "2026-03-01"),
            used,
            leave(LeaveStatus::Pending, LeaveKind::EarlyExit, "2026-03-01"),
        ];
        let snap = Snapshot {
            schools: &[],
            students: &[],
            records: &[],
            leaves: &leaves,
        };
        let out = for_user(&user(Role::Security), &snap, &rules(), d("2026-03-01"));
        assert_eq!(out.len(), 1);
        assert!(out[0].message.starts_with("1 "));
    }
}
