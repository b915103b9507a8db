// src/postprocess/dates.rs

use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::warn;

use crate::workbook::CellValue;

/// Accepted spellings of a declaration date, tried in order. Month-first
/// wins over day-first for ambiguous slash dates.
const DATE_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month padding:none]-[day padding:none]"),
    format_description!("[year]/[month padding:none]/[day padding:none]"),
    format_description!("[year].[month padding:none].[day padding:none]"),
    format_description!("[year][month][day]"),
    format_description!("[month padding:none]/[day padding:none]/[year]"),
    format_description!("[day padding:none]/[month padding:none]/[year]"),
    format_description!("[day padding:none]-[month padding:none]-[year]"),
    format_description!("[day padding:none].[month padding:none].[year]"),
    format_description!("[day padding:none] [month repr:long case_sensitive:false] [year]"),
    format_description!("[day padding:none] [month repr:short case_sensitive:false] [year]"),
    format_description!("[day padding:none]-[month repr:short case_sensitive:false]-[year]"),
    format_description!("[month repr:long case_sensitive:false] [day padding:none], [year]"),
    format_description!("[month repr:short case_sensitive:false] [day padding:none], [year]"),
];

/// Parse free-form date text. A trailing time part (`2025-01-20 10:30`,
/// `2025-01-20T10:30:00`) is ignored.
pub fn parse_date(text: &str) -> Option<Date> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let candidates = [
        Some(text),
        text.split_once('T').map(|(d, _)| d),
        text.split_once(' ').map(|(d, _)| d),
    ];
    candidates.into_iter().flatten().find_map(|candidate| {
        DATE_FORMATS
            .iter()
            .find_map(|format| Date::parse(candidate, format).ok())
    })
}

fn render(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Calendar-date text for a date cell. Native date values and parseable text
/// become `YYYY-MM-DD`; anything else comes back unchanged.
pub fn normalize_date(value: &CellValue) -> CellValue {
    match value {
        CellValue::DateTime(dt) => CellValue::text(render(dt.date())),
        CellValue::Text(s) => match parse_date(s) {
            Some(date) => CellValue::text(render(date)),
            None => {
                warn!(value = %s, "Unparseable date left unchanged");
                value.clone()
            }
        },
        other => other.clone(),
    }
}
