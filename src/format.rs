//! Display helpers for sizes, dates and file icons.

use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

const GERMAN_MONTHS: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

/// Human readable size in powers of 1024, e.g. `1536` becomes `"1.5 KB"`
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_owned();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", BYTE_UNITS[unit])
}

/// Render an RFC 3339 timestamp as a long German date in the local offset,
/// e.g. `"15. März 2024"`. Returns `None` for unparseable input.
pub fn format_date(raw: &str) -> Option<String> {
    let mut timestamp = OffsetDateTime::parse(raw, &Rfc3339).ok()?;
    if let Ok(offset) = UtcOffset::current_local_offset() {
        timestamp = timestamp.to_offset(offset);
    }

    let month = GERMAN_MONTHS[usize::from(u8::from(timestamp.month())) - 1];
    Some(format!("{:02}. {month} {}", timestamp.day(), timestamp.year()))
}

/// Material icon name for a file, chosen by extension
pub fn file_icon(name: &str) -> &'static str {
    let extension = name.rsplit('.').next().unwrap_or(name);
    match extension {
        "zip" | "rar" | "7z" => "folder_zip",
        "htm" | "html" => "html",
        "js" => "javascript",
        "json" => "data_object",
        "md" => "article",
        "pdf" => "picture_as_pdf",
        "png" | "jpg" | "jpeg" | "webp" => "image",
        "mp4" | "mkv" | "avi" | "wmv" | "mov" => "movie",
        "txt" => "description",
        "xls" => "table_chart",
        _ => "insert_drive_file",
    }
}

pub fn folder_icon() -> &'static str {
    "folder"
}
