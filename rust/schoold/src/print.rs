//! Printable HTML documents. Every interpolated value goes through
//! [`escape`]; documents are right-to-left.

use crate::model::{ClinicVisit, HealthRecord, LeaveRequest, School, Student};
use chrono::NaiveDate;

pub fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn opt(v: Option<&str>) -> String {
    escape(v.unwrap_or("-"))
}

const STYLE: &str = "body{font-family:Tahoma,Arial,sans-serif;margin:24px}\
table{border-collapse:collapse;width:100%}\
td,th{border:1px solid #999;padding:6px;text-align:right}\
.card{border:2px solid #333;border-radius:8px;padding:16px;width:320px}\
.muted{color:#666;font-size:12px}";

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"ar\" dir=\"rtl\">\n<head>\n<meta charset=\"utf-8\">\n\
<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        STYLE,
        body
    )
}

fn header(school: &School) -> String {
    format!("<h2>{}</h2>", escape(&school.name))
}

pub fn id_card(school: &School, student: &Student, qr_url: &str) -> String {
    let body = format!(
        "<div class=\"card\">{}<p>الاسم: <strong>{}</strong></p><p>الصف: {}</p>\
<p>رقم الهوية: {}</p><img alt=\"QR\" src=\"{}\"><p class=\"muted\">{}</p></div>",
        header(school),
        escape(&student.name),
        escape(&student.grade),
        opt(student.national_id.as_deref()),
        escape(qr_url),
        escape(&student.id),
    );
    document(&format!("بطاقة الطالب - {}", student.name), &body)
}

pub fn gate_pass(school: &School, student: &Student, request: &LeaveRequest, qr_url: &str) -> String {
    let body = format!(
        "{}<h3>تصريح خروج</h3><table>\
<tr><th>الطالب</th><td>{}</td></tr>\
<tr><th>الصف</th><td>{}</td></tr>\
<tr><th>التاريخ</th><td>{}</td></tr>\
<tr><th>وقت الخروج</th><td>{}</td></tr>\
<tr><th>السبب</th><td>{}</td></tr>\
</table><p><img alt=\"QR\" src=\"{}\"></p>",
        header(school),
        escape(&student.name),
        escape(&student.grade),
        request.date,
        opt(request.exit_time.as_deref()),
        escape(&request.reason),
        escape(qr_url),
    );
    document("تصريح خروج", &body)
}

pub fn official_letter(
    school: &School,
    date: NaiveDate,
    recipient: Option<&str>,
    subject: &str,
    body_text: &str,
) -> String {
    let paragraphs: String = body_text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| format!("<p>{}</p>", escape(l.trim())))
        .collect();
    let to = recipient
        .map(|r| format!("<p>إلى: {}</p>", escape(r)))
        .unwrap_or_default();
    let body = format!(
        "{}<p class=\"muted\">التاريخ: {}</p>{}<h3>الموضوع: {}</h3>{}\
<p>مدير المدرسة</p>",
        header(school),
        date,
        to,
        escape(subject),
        paragraphs
    );
    document(subject, &body)
}

pub fn medical_report(
    school: &School,
    student: &Student,
    health: Option<&HealthRecord>,
    visits: &[ClinicVisit],
) -> String {
    let h = health.cloned().unwrap_or_default();
    let rows: String = visits
        .iter()
        .map(|v| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                v.date,
                escape(&v.time),
                escape(&v.complaint),
                opt(v.treatment.as_deref()),
                escape(v.outcome.as_str())
            )
        })
        .collect();
    let body = format!(
        "{}<h3>تقرير طبي: {}</h3><table>\
<tr><th>فصيلة الدم</th><td>{}</td></tr>\
<tr><th>الحساسية</th><td>{}</td></tr>\
<tr><th>الأمراض المزمنة</th><td>{}</td></tr>\
<tr><th>الأدوية</th><td>{}</td></tr>\
<tr><th>جهة الاتصال للطوارئ</th><td>{}</td></tr>\
</table><h4>زيارات العيادة</h4><table>\
<tr><th>التاريخ</th><th>الوقت</th><th>الشكوى</th><th>العلاج</th><th>النتيجة</th></tr>{}</table>",
        header(school),
        escape(&student.name),
        opt(h.blood_type.as_deref()),
        opt(h.allergies.as_deref()),
        opt(h.chronic_conditions.as_deref()),
        opt(h.medications.as_deref()),
        opt(h.emergency_contact.as_deref()),
        rows
    );
    document(&format!("تقرير طبي - {}", student.name), &body)
}
