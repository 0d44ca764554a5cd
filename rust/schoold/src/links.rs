//! Outbound links: WhatsApp deep links, QR image URLs and the prefilled
//! parent notice.

use crate::config::LinkConfig;
use crate::model::{AttendanceStatus, Student};
use chrono::NaiveDate;

/// Digits only, with a national leading `0` swapped for the country code.
pub fn normalize_phone(phone: &str, country_code: &str) -> Option<String> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Some(match digits.strip_prefix('0') {
        Some(rest) => format!("{}{}", country_code, rest),
        None => digits,
    })
}

pub fn whatsapp_url(cfg: &LinkConfig, phone: &str, message: &str) -> Option<String> {
    let number = normalize_phone(phone, &cfg.default_country_code)?;
    Some(format!(
        "https://wa.me/{}?text={}",
        number,
        urlencoding::encode(message)
    ))
}

pub fn qr_url(cfg: &LinkConfig, data: &str) -> String {
    format!(
        "{}?size={n}x{n}&data={}",
        cfg.qr_endpoint,
        urlencoding::encode(data),
        n = cfg.qr_size
    )
}

/// Arabic message sent to a parent about the day's attendance.
pub fn parent_notice(student: &Student, status: Option<AttendanceStatus>, date: NaiveDate) -> String {
    let day = date.format("%Y-%m-%d");
    match status {
        Some(AttendanceStatus::Absent) => format!(
            "ولي أمر الطالب {} المحترم، نحيطكم علماً بغياب ابنكم عن المدرسة يوم {}. نأمل التواصل مع إدارة المدرسة.",
            student.name, day
        ),
        Some(AttendanceStatus::Late) => format!(
            "ولي أمر الطالب {} المحترم، نحيطكم علماً بتأخر ابنكم عن الحضور يوم {}.",
            student.name, day
        ),
        _ => format!(
            "ولي أمر الطالب {} المحترم، نود التواصل معكم بخصوص حضور ابنكم يوم {}.",
            student.name, day
        ),
    }
}
