//! Submitted form data
//!
//! Create and update endpoints accept JSON or `multipart/form-data`; both are
//! flattened into a [`FormData`] of text fields and uploaded files. Services
//! read only the fields they know, so a partial update simply omits fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;

use super::error::FieldErrors;

/// A file received in a multipart request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert_field(name, value);
        self
    }

    pub fn with_file(mut self, name: &str, file: UploadedFile) -> Self {
        self.insert_file(name, file);
        self
    }

    pub fn insert_field(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn insert_file(&mut self, name: &str, file: UploadedFile) {
        self.files.insert(name.to_string(), file);
    }

    /// Whether the field was submitted at all (possibly empty)
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Trimmed text value; `Some("")` when submitted empty
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.trim())
    }

    /// Untrimmed value for secrets such as passwords; `None` when absent or empty
    pub fn secret(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Trimmed, non-empty text value
    pub fn filled(&self, name: &str) -> Option<&str> {
        self.text(name).filter(|v| !v.is_empty())
    }

    /// Present field mapped to `Some(None)` when empty, used to clear nullable columns
    pub fn nullable_text(&self, name: &str) -> Option<Option<String>> {
        self.text(name)
            .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    /// Checkbox-style flag: `true`, `1`, `on`, `yes`
    pub fn flag(&self, name: &str) -> bool {
        self.text(name).map_or(false, is_truthy)
    }

    pub fn integer(&self, name: &str, errors: &mut FieldErrors) -> Option<i64> {
        let value = self.filled(name)?;
        match value.parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                errors.add(name, format!("The {} must be an integer.", label(name)));
                None
            }
        }
    }

    /// `Some(None)` when submitted empty
    pub fn nullable_integer(&self, name: &str, errors: &mut FieldErrors) -> Option<Option<i64>> {
        match self.text(name)? {
            "" => Some(None),
            _ => self.integer(name, errors).map(Some),
        }
    }

    pub fn boolean(&self, name: &str, errors: &mut FieldErrors) -> Option<bool> {
        let value = self.filled(name)?;
        if is_truthy(value) {
            Some(true)
        } else if matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "off" | "no") {
            Some(false)
        } else {
            errors.add(name, format!("The {} field must be true or false.", label(name)));
            None
        }
    }

    /// Parse an enum through `FromStr`
    pub fn choice<T: FromStr>(&self, name: &str, errors: &mut FieldErrors) -> Option<T> {
        let value = self.filled(name)?;
        match value.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                errors.add(name, format!("The selected {} is invalid.", label(name)));
                None
            }
        }
    }

    /// RFC 3339, `YYYY-MM-DD HH:MM[:SS]` (UTC) or a bare date; `Some(None)` when empty
    pub fn datetime(&self, name: &str, errors: &mut FieldErrors) -> Option<Option<DateTime<Utc>>> {
        let value = self.text(name)?;
        if value.is_empty() {
            return Some(None);
        }
        match parse_datetime(value) {
            Some(at) => Some(Some(at)),
            None => {
                errors.add(name, format!("The {} is not a valid date.", label(name)));
                None
            }
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Human label for a field name in messages
pub fn label(field: &str) -> String {
    field.replace('_', " ")
}

/// Record a "required" error when `value` is blank
pub fn require(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, format!("The {} field is required.", label(field)));
    }
}

/// Record a length error when `value` exceeds `max` characters
pub fn max_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("The {} may not be greater than {} characters.", label(field), max),
        );
    }
}

pub fn min_value(errors: &mut FieldErrors, field: &str, value: i64, min: i64) {
    if value < min {
        errors.add(field, format!("The {} must be at least {}.", label(field), min));
    }
}

pub fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/') && !value.contains(char::is_whitespace))
}

pub fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentStatus;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_text_helpers() {
        let form = FormData::new().with("name", "  Kit  ").with("excerpt", "");
        assert_eq!(form.text("name"), Some("Kit"));
        assert_eq!(form.filled("excerpt"), None);
        assert_eq!(form.nullable_text("excerpt"), Some(None));
        assert_eq!(form.nullable_text("missing"), None);
        assert!(form.has("excerpt"));
    }

    #[test]
    fn test_secret_keeps_whitespace() {
        let form = FormData::new().with("password", "  spaced out  ").with("empty", "");
        assert_eq!(form.secret("password"), Some("  spaced out  "));
        assert_eq!(form.secret("empty"), None);
        assert_eq!(form.secret("missing"), None);
    }

    #[test]
    fn test_integer_parsing_records_errors() {
        let form = FormData::new().with("price_cents", "12a").with("width", "300");
        let mut errors = FieldErrors::new();
        assert_eq!(form.integer("price_cents", &mut errors), None);
        assert_eq!(form.integer("width", &mut errors), Some(300));
        assert_eq!(form.integer("height", &mut errors), None);
        assert_eq!(
            errors.get("price_cents").unwrap()[0],
            "The price cents must be an integer."
        );
        assert!(!errors.has("height"));
    }

    #[test]
    fn test_choice_and_boolean() {
        let form = FormData::new()
            .with("status", "PUBLISHED")
            .with("remote", "on")
            .with("bad", "maybe");
        let mut errors = FieldErrors::new();
        assert_eq!(
            form.choice::<ContentStatus>("status", &mut errors),
            Some(ContentStatus::Published)
        );
        assert_eq!(form.boolean("remote", &mut errors), Some(true));
        assert_eq!(form.boolean("bad", &mut errors), None);
        assert!(errors.has("bad"));
    }

    #[test]
    fn test_datetime_formats() {
        let form = FormData::new()
            .with("a", "2026-03-01T10:30:00Z")
            .with("b", "2026-03-01 10:30")
            .with("c", "2026-03-01")
            .with("d", "")
            .with("e", "tomorrow");
        let mut errors = FieldErrors::new();
        let a = form.datetime("a", &mut errors).unwrap().unwrap();
        assert_eq!((a.day(), a.hour(), a.minute()), (1, 10, 30));
        assert_eq!(form.datetime("b", &mut errors).unwrap(), Some(a));
        assert_eq!(form.datetime("c", &mut errors).unwrap().unwrap().hour(), 0);
        assert_eq!(form.datetime("d", &mut errors), Some(None));
        assert_eq!(form.datetime("e", &mut errors), None);
        assert!(errors.has("e"));
    }

    #[test]
    fn test_url_and_email_checks() {
        assert!(is_http_url("https://example.com/x"));
        assert!(is_http_url("HTTP://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("javascript:alert(1)"));

        assert!(is_email("a@b.test"));
        assert!(!is_email("a@"));
        assert!(!is_email("no-at-sign"));
        assert!(!is_email("a b@c.d"));
    }
}
