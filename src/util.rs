//! Ids, timestamps, and small display helpers.

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::RngCore;

use crate::error::MnemoError;

/// The one timestamp format used everywhere: UTC, second precision,
/// literal `Z`. Parsing accepts exactly this and nothing else.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Short opaque id: 8 lowercase hex chars from 4 OS-random bytes.
pub fn new_id() -> String {
    let mut bytes = [0u8; 4];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, MnemoError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|n| n.and_utc())
        .map_err(|e| MnemoError::Validation(format!("bad timestamp '{s}': {e}")))
}

/// Truncate a string to `max` characters, appending "…" if truncated.
/// Counts chars, not bytes, so multi-byte text stays valid.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_eight_hex_chars() {
        let id = new_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn ids_differ() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
    }

    #[test]
    fn now_roundtrips() {
        let ts = now();
        assert!(ts.ends_with('Z'));
        parse_ts(&ts).expect("own output must parse");
    }

    #[test]
    fn parse_rejects_other_formats() {
        assert!(parse_ts("2024-01-01 00:00:00").is_err());
        assert!(parse_ts("2024-01-01T00:00:00+00:00").is_err());
        assert!(parse_ts("2024-01-01T00:00:00.123Z").is_err());
    }

    #[test]
    fn parse_accepts_exact_format() {
        let dt = parse_ts("2024-06-15T12:30:45Z").unwrap();
        assert_eq!(dt.timestamp(), 1718454645);
    }

    #[test]
    fn ascii_no_truncate() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn ascii_truncate() {
        assert_eq!(truncate_chars("hello world", 5), "hello…");
    }

    #[test]
    fn empty_string() {
        assert_eq!(truncate_chars("", 5), "");
    }
}
