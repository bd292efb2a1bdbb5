//! Small value helpers shared by the normalizers, the upsert engine and the registration payload.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Stand-in for a source date that is missing. Downstream code reads it as "unknown".
pub const UNKNOWN_DATE: &str = "2000-01-01T11:11:11";

pub const WITHDRAWN_STATE: &str = "withdrawn";

const SOURCE_DATE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

static ORCID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://orcid.org/[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[X0-9]$")
        .expect("valid ORCID regex")
});

pub fn unknown_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|date| date.and_hms_opt(11, 11, 11))
        .unwrap_or_default()
}

/// Parses a source timestamp, with or without fractional seconds.
///
/// Missing and empty values become [`UNKNOWN_DATE`]. A present value in an unknown
/// format is an error so the record is reported rather than silently misdated.
pub fn parse_source_date(value: Option<&str>) -> Result<NaiveDateTime, String> {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(unknown_date());
    };
    let trimmed = raw.trim_end_matches('Z');
    for format in SOURCE_DATE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.naive_utc())
        .map_err(|_| format!("unrecognised date {raw}"))
}

/// Extension of a file name including the leading dot, or an empty string.
pub fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Only PDFs are told apart, every other upload is recorded as a Word document.
pub fn mime_type_for(file_name: &str) -> &'static str {
    if file_extension(file_name) == ".pdf" {
        "application/pdf"
    } else {
        "application/msword"
    }
}

pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for c in value.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }
    slug
}

/// Returns a full ORCID URL, or `None` when the value is not a well-formed ORCID.
pub fn normalize_orcid(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let candidate = if raw.starts_with("http") {
        raw.to_string()
    } else {
        format!("https://orcid.org/{raw}")
    };
    ORCID_RE.is_match(&candidate).then_some(candidate)
}

/// Strips single quotes the way imported titles and abstracts have always been stored.
pub fn strip_quotes(value: &str) -> String {
    value.replace('\'', "")
}
