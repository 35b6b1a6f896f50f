use chrono::{DateTime, Utc};

/// Hands out unique candidate names.
pub trait NameGenerator: Send + Sync {
    fn next_name(&self, previous: Option<&str>, now: DateTime<Utc>) -> String;
}

/// `YYMMDD` followed by a lowercase suffix that counts `aaa`, `aab`, ... and
/// restarts every UTC day.
#[derive(Debug, Clone, Default)]
pub struct DatedNameGenerator;

const FIRST_SUFFIX: &str = "aaa";

impl NameGenerator for DatedNameGenerator {
    fn next_name(&self, previous: Option<&str>, now: DateTime<Utc>) -> String {
        let prefix = now.format("%y%m%d").to_string();

        let suffix = previous
            .and_then(|p| p.strip_prefix(prefix.as_str()))
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase()))
            .map(increment)
            .unwrap_or_else(|| FIRST_SUFFIX.to_string());

        format!("{}{}", prefix, suffix)
    }
}

/// Base-26 increment over `a..=z`; `zzz` becomes `aaaa`.
fn increment(suffix: &str) -> String {
    let mut bytes = suffix.as_bytes().to_vec();
    for b in bytes.iter_mut().rev() {
        if *b == b'z' {
            *b = b'a';
        } else {
            *b += 1;
            return String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    let mut grown = vec![b'a'];
    grown.extend(bytes);
    String::from_utf8_lossy(&grown).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 3, 0, 0).unwrap()
    }

    #[test]
    fn test_first_name_of_day() {
        let gen = DatedNameGenerator;
        assert_eq!(gen.next_name(None, day()), "261016aaa");
        assert_eq!(gen.next_name(Some("261015abc"), day()), "261016aaa");
    }

    #[test]
    fn test_increments_same_day() {
        let gen = DatedNameGenerator;
        assert_eq!(gen.next_name(Some("261016aaa"), day()), "261016aab");
        assert_eq!(gen.next_name(Some("261016aaz"), day()), "261016aba");
        assert_eq!(gen.next_name(Some("261016zzz"), day()), "261016aaaa");
    }

    #[test]
    fn test_foreign_previous_name_restarts() {
        let gen = DatedNameGenerator;
        assert_eq!(gen.next_name(Some("261016AB1"), day()), "261016aaa");
    }
}
