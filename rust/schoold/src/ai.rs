//! Prompt shaping and reply parsing for the assistant.
//!
//! The daemon never talks to the model. The UI shell forwards the prepared
//! prompt and hands the raw reply back for interpretation.

use crate::calc::RateSummary;
use crate::model::{AttendanceStatus, Student};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Shown instead of an empty or failed assistant reply.
pub const FALLBACK_REPLY: &str = "عذراً، حدث خطأ أثناء الاتصال بالمساعد الذكي.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AiTask {
    AttendanceAnalysis,
    ParentMessage,
    AttendanceCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedPrompt {
    pub system_instruction: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct SchoolStats {
    pub school_name: String,
    pub student_count: usize,
    pub overall: RateSummary,
    /// (name, rate), lowest first.
    pub at_risk: Vec<(String, u32)>,
    pub streaks: Vec<String>,
}

pub fn attendance_analysis(stats: &SchoolStats) -> PreparedPrompt {
    let t = stats.overall.tally;
    let mut prompt = format!(
        "المدرسة: {}\nعدد الطلاب: {}\nنسبة الحضور العامة: {}%\n\
حاضر: {}، غائب: {}، متأخر: {}، مستأذن: {}\n",
        stats.school_name, stats.student_count, stats.overall.rate, t.present, t.absent, t.late,
        t.excused
    );
    if !stats.at_risk.is_empty() {
        prompt.push_str("طلاب معرضون للخطر:\n");
        for (name, rate) in &stats.at_risk {
            prompt.push_str(&format!("- {} ({}%)\n", name, rate));
        }
    }
    if !stats.streaks.is_empty() {
        prompt.push_str(&format!("غياب متتالٍ: {}\n", stats.streaks.join("، ")));
    }
    prompt.push_str("حلل هذه البيانات وقدم ثلاث توصيات عملية للإدارة.");
    PreparedPrompt {
        system_instruction: "أنت مستشار تربوي يحلل بيانات الحضور المدرسي ويكتب بالعربية بإيجاز."
            .to_string(),
        prompt,
        response_schema: None,
    }
}

pub fn parent_message(student: &Student, issue: &str) -> PreparedPrompt {
    PreparedPrompt {
        system_instruction: "أنت مساعد إداري في مدرسة تكتب رسائل مهذبة وقصيرة لأولياء الأمور بالعربية."
            .to_string(),
        prompt: format!(
            "اكتب رسالة واتساب لولي أمر الطالب {} (الصف {}) بخصوص: {}",
            student.name,
            student.grade,
            issue.trim()
        ),
        response_schema: None,
    }
}

/// `input` is free text, a voice transcript or an image description.
pub fn attendance_command(input: &str, roster: &[Student]) -> PreparedPrompt {
    let names: Vec<&str> = roster.iter().map(|s| s.name.as_str()).collect();
    PreparedPrompt {
        system_instruction: "Extract attendance marks from the teacher's input. Use only names \
from the roster. Status is one of present, absent, late, excused. Reply with a JSON array."
            .to_string(),
        prompt: format!("Roster: {}\nInput: {}", names.join(", "), input.trim()),
        response_schema: Some(json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "status": {
                        "type": "string",
                        "enum": AttendanceStatus::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>()
                    }
                },
                "required": ["name", "status"]
            }
        })),
    }
}

pub fn interpret_text(reply: &str) -> String {
    let reply = reply.trim();
    if reply.is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        reply.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawMark {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMark {
    pub student_id: String,
    pub name: String,
    pub status: AttendanceStatus,
}

fn strip_fences(reply: &str) -> &str {
    let s = reply.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string (`json`) on the opening fence. A one-line fence
    // has the body right after it.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parses a JSON array of `{name, status}`; anything unparsable yields `[]`.
pub fn parse_marks(reply: &str) -> Vec<RawMark> {
    let body = strip_fences(reply);
    if let Ok(marks) = serde_json::from_str::<Vec<RawMark>>(body) {
        return marks;
    }
    match (body.find('['), body.rfind(']')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str(&body[start..=end]).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

pub fn parse_status(raw: &str) -> Option<AttendanceStatus> {
    let s = raw.trim().to_lowercase();
    AttendanceStatus::parse(&s).or(match s.as_str() {
        "حاضر" | "حضور" => Some(AttendanceStatus::Present),
        "غائب" | "غياب" => Some(AttendanceStatus::Absent),
        "متأخر" | "تأخر" => Some(AttendanceStatus::Late),
        "مستأذن" | "معذور" | "عذر" => Some(AttendanceStatus::Excused),
        _ => None,
    })
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Matches a spoken or typed name to one roster entry: exact first, then a
/// unique partial match. Ambiguous names resolve to nothing.
pub fn resolve_name<'a>(name: &str, roster: &'a [Student]) -> Option<&'a Student> {
    let wanted = normalize_name(name);
    if wanted.is_empty() {
        return None;
    }
    if let Some(s) = roster.iter().find(|s| normalize_name(&s.name) == wanted) {
        return Some(s);
    }
    let mut partial = roster.iter().filter(|s| normalize_name(&s.name).contains(&wanted));
    match (partial.next(), partial.next()) {
        (Some(s), None) => Some(s),
        _ => None,
    }
}

pub fn resolve_marks(marks: Vec<RawMark>, roster: &[Student]) -> Vec<ResolvedMark> {
    marks
        .into_iter()
        .filter_map(|m| {
            let status = parse_status(&m.status)?;
            let student = resolve_name(&m.name, roster)?;
            Some(ResolvedMark {
                student_id: student.id.clone(),
                name: student.name.clone(),
                status,
            })
        })
        .collect()
}
