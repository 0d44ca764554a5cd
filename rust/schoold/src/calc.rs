use crate::model::{AttendanceRecord, AttendanceStatus};
use serde::Serialize;

/// Label shown instead of a rate for students with no history.
pub const NEW_STUDENT_LABEL: &str = "جديد";

/// Score every student starts from before behavior points apply.
pub const BEHAVIOR_BASELINE: i64 = 100;

/// Half-up rounding to an integer, matching how rates are displayed.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTally {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub total: usize,
}

impl AttendanceTally {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = AttendanceStatus>,
    {
        let mut t = Self::default();
        for s in statuses {
            t.add(s);
        }
        t
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AttendanceRecord>,
    {
        Self::from_statuses(records.into_iter().map(|r| r.status))
    }

    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
        self.total += 1;
    }

    /// Weighted rate: excused counts fully, late counts half, absent not at
    /// all. No records means 100.
    pub fn rate(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        let credited = self.present as f64 + self.excused as f64 + self.late as f64 * 0.5;
        round_half_up(credited / self.total as f64 * 100.0) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSummary {
    pub rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<&'static str>,
    pub tally: AttendanceTally,
}

impl RateSummary {
    pub fn from_tally(tally: AttendanceTally) -> Self {
        Self {
            rate: tally.rate(),
            label: (tally.total == 0).then_some(NEW_STUDENT_LABEL),
            tally,
        }
    }
}

pub fn rate_summary<'a, I>(records: I) -> RateSummary
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    RateSummary::from_tally(AttendanceTally::from_records(records))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskRules {
    pub threshold: u32,
    pub min_records: usize,
}

/// At risk only once enough history exists to judge.
pub fn is_at_risk(tally: &AttendanceTally, rules: RiskRules) -> bool {
    tally.total >= rules.min_records && tally.rate() < rules.threshold
}

/// True when the `window` most recent records (by date) are all absences.
/// Fewer than `window` records never qualify.
pub fn has_absence_streak(records: &[&AttendanceRecord], window: usize) -> bool {
    if window == 0 || records.len() < window {
        return false;
    }
    let mut sorted: Vec<&AttendanceRecord> = records.to_vec();
    sorted.sort_by_key(|r| r.date);
    sorted[sorted.len() - window..]
        .iter()
        .all(|r| r.status == AttendanceStatus::Absent)
}

pub fn behavior_score<I>(points: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    BEHAVIOR_BASELINE + points.into_iter().sum::<i64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use AttendanceStatus::*;

    fn rec(date: &str, status: AttendanceStatus) -> AttendanceRecord {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        AttendanceRecord {
            id: AttendanceRecord::key(date, "s1"),
            school_id: "sch".into(),
            student_id: "s1".into(),
            date,
            status,
            note: None,
            recorded_by: None,
        }
    }

    #[test]
    fn mixed_history_rate_rounds_half_up() {
        let t = AttendanceTally::from_statuses([Present, Present, Excused, Late]);
        assert_eq!(t.total, 4);
        assert_eq!(t.rate(), 88);
    }

    #[test]
    fn empty_history_is_new_student_at_100() {
        let s = RateSummary::from_tally(AttendanceTally::default());
        assert_eq!(s.rate, 100);
        assert_eq!(s.label, Some(NEW_STUDENT_LABEL));
    }

    #[test]
    fn excused_counts_fully_and_absent_not_at_all() {
        assert_eq!(AttendanceTally::from_statuses([Excused, Excused]).rate(), 100);
        assert_eq!(AttendanceTally::from_statuses([Absent, Absent]).rate(), 0);
        assert_eq!(AttendanceTally::from_statuses([Late]).rate(), 50);
        assert_eq!(AttendanceTally::from_statuses([Present, Absent, Absent]).rate(), 33);
        assert_eq!(AttendanceTally::from_statuses([Present, Present, Absent]).rate(), 67);
    }

    #[test]
    fn rate_stays_within_bounds_for_every_small_mix() {
        let all = [Present, Absent, Late, Excused];
        for a in all {
            for b in all {
                for c in all {
                    let r = AttendanceTally::from_statuses([a, b, c]).rate();
                    assert!(r <= 100, "{a:?} {b:?} {c:?} -> {r}");
                }
            }
        }
    }

    #[test]
    fn at_risk_needs_minimum_history() {
        let rules = RiskRules {
            threshold: 75,
            min_records: 3,
        };
        let two_absent = AttendanceTally::from_statuses([Absent, Absent]);
        assert!(!is_at_risk(&two_absent, rules));
        let three = AttendanceTally::from_statuses([Absent, Absent, Present]);
        assert!(is_at_risk(&three, rules));
        let fine = AttendanceTally::from_statuses([Present, Present, Late, Present]);
        assert!(!is_at_risk(&fine, rules));
    }

    #[test]
    fn streak_uses_most_recent_records_by_date() {
        let records = vec![
            rec("2026-03-04", Absent),
            rec("2026-03-01", Present),
            rec("2026-03-03", Absent),
            rec("2026-03-02", Absent),
        ];
        let refs: Vec<&AttendanceRecord> = records.iter().collect();
        assert!(has_absence_streak(&refs, 3));

        let broken = vec![
            rec("2026-03-02", Absent),
            rec("2026-03-03", Late),
            rec("2026-03-04", Absent),
            rec("2026-03-01", Absent),
        ];
        let refs: Vec<&AttendanceRecord> = broken.iter().collect();
        assert!(!has_absence_streak(&refs, 3));
    }

    #[test]
    fn streak_never_fires_below_window() {
        let records = vec![rec("2026-03-01", Absent), rec("2026-03-02", Absent)];
        let refs: Vec<&AttendanceRecord> = records.iter().collect();
        assert!(!has_absence_streak(&refs, 3));
        assert!(!has_absence_streak(&[], 3));
    }

    #[test]
    fn behavior_score_starts_at_baseline() {
        assert_eq!(behavior_score(Vec::<i64>::new()), 100);
        assert_eq!(behavior_score([5, -10, 2]), 97);
    }
}
