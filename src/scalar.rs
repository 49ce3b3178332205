use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CompileError;

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .unwrap()
});

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[T ](\d{2}):(\d{2}):(\d{2})(\.\d+)?$").unwrap()
});

/// Validates `YYYY-MM-DD` against a real calendar.
pub fn validate_date(s: &str) -> Result<(), CompileError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| CompileError::InvalidScalar { kind: "date", value: s.to_string() })
}

/// Validates `YYYY-MM-DDTHH:MM:SS(.ffffff)?` with a space separator also
/// accepted, hour/minute/second ranges enforced.
pub fn validate_timestamp(s: &str) -> Result<(), CompileError> {
    let caps = TIMESTAMP_RE
        .captures(s)
        .ok_or_else(|| CompileError::InvalidScalar { kind: "timestamp", value: s.to_string() })?;
    let date_part = format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]);
    validate_date(&date_part).map_err(|_| CompileError::InvalidScalar {
        kind: "timestamp",
        value: s.to_string(),
    })?;
    let hour: u32 = caps[4].parse().unwrap();
    let minute: u32 = caps[5].parse().unwrap();
    let second: u32 = caps[6].parse().unwrap();
    if hour > 23 || minute > 59 || second > 59 {
        return Err(CompileError::InvalidScalar { kind: "timestamp", value: s.to_string() });
    }
    Ok(())
}

/// Validates an RFC 4122 v1-v5 UUID string.
pub fn validate_uuid(s: &str) -> Result<(), CompileError> {
    if UUID_RE.is_match(s) {
        Ok(())
    } else {
        Err(CompileError::InvalidScalar { kind: "uuid", value: s.to_string() })
    }
}

/// A `$jsonb` tagged scalar accepts any non-null JSON object.
pub fn validate_jsonb(v: &serde_json::Value) -> Result<(), CompileError> {
    if v.is_null() {
        Err(CompileError::InvalidScalar { kind: "jsonb", value: "null".to_string() })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_date_accepted() {
        assert!(validate_date("2024-02-29").is_ok());
    }

    #[test]
    fn invalid_calendar_date_rejected() {
        assert!(validate_date("2023-02-29").is_err());
    }

    #[test]
    fn timestamp_with_space_separator_accepted() {
        assert!(validate_timestamp("2024-01-01 23:59:59").is_ok());
    }

    #[test]
    fn timestamp_with_fraction_accepted() {
        assert!(validate_timestamp("2024-01-01T23:59:59.123456").is_ok());
    }

    #[test]
    fn timestamp_out_of_range_rejected() {
        assert!(validate_timestamp("2024-01-01T24:00:00").is_err());
    }

    #[test]
    fn uuid_v4_accepted() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
    }

    #[test]
    fn uuid_bad_version_rejected() {
        assert!(validate_uuid("550e8400-e29b-61d4-a716-446655440000").is_err());
    }
}
