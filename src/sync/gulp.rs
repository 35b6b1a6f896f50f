use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("could not get a gulp number from '{0}'")]
    BadGulpId(String),
}

/// One source's contribution to a gulp: the leading gulp number and the
/// candidate rows that followed it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePayload {
    pub source_id: String,
    pub gulp_id: i64,
    pub body: String,
}

impl SourcePayload {
    /// Split a raw payload into its leading gulp number and body.
    pub fn parse(source_id: &str, raw: &[u8]) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(raw).map_err(|_| PayloadError::InvalidUtf8)?;
        let (head, body) = match text.split_once('\n') {
            Some((head, body)) => (head, body),
            None => (text, ""),
        };

        let gulp_id = head
            .trim()
            .parse::<i64>()
            .map_err(|_| PayloadError::BadGulpId(head.chars().take(32).collect()))?;

        Ok(Self {
            source_id: source_id.to_string(),
            gulp_id,
            body: body.to_string(),
        })
    }
}

/// A synchronized batch: every configured source contributed the same gulp.
#[derive(Debug, Clone)]
pub struct Gulp {
    pub gulp_id: i64,
    pub payloads: Vec<SourcePayload>,
    pub received_at: DateTime<Utc>,
}

impl Gulp {
    /// All source bodies joined, one candidate row per line.
    pub fn merged_body(&self) -> String {
        merge_bodies(&self.payloads)
    }

    pub fn is_blank(&self) -> bool {
        self.payloads.iter().all(|p| p.body.trim().is_empty())
    }
}

fn merge_bodies(payloads: &[SourcePayload]) -> String {
    let mut merged = String::new();
    for payload in payloads {
        let body = payload.body.trim_end_matches(['\n', '\r']);
        if body.trim().is_empty() {
            continue;
        }
        if !merged.is_empty() {
            merged.push('\n');
        }
        merged.push_str(body);
    }
    merged
}

/// Result of checking one cycle's contributions against each other.
#[derive(Debug)]
pub enum Validation {
    Usable(Gulp),
    /// Fewer sources produced a parseable gulp number than were expected.
    Incomplete { parsed: usize, expected: usize },
    /// Sources disagree on the gulp number.
    Divergent { gulp_ids: BTreeSet<i64> },
    /// Sources agree but sent no candidate rows.
    Empty { gulp_id: i64 },
}

impl Validation {
    pub fn gulp_id(&self) -> Option<i64> {
        match self {
            Validation::Usable(gulp) => Some(gulp.gulp_id),
            Validation::Empty { gulp_id } => Some(*gulp_id),
            _ => None,
        }
    }
}

/// Decide whether `payloads` form a usable gulp. `expected` is the number of
/// configured sources; a source whose payload did not parse is simply absent.
pub fn validate(payloads: Vec<SourcePayload>, expected: usize, received_at: DateTime<Utc>) -> Validation {
    if payloads.len() < expected || payloads.is_empty() {
        return Validation::Incomplete {
            parsed: payloads.len(),
            expected,
        };
    }

    let gulp_ids: BTreeSet<i64> = payloads.iter().map(|p| p.gulp_id).collect();
    if gulp_ids.len() > 1 {
        return Validation::Divergent { gulp_ids };
    }

    let gulp_id = payloads[0].gulp_id;
    let gulp = Gulp {
        gulp_id,
        payloads,
        received_at,
    };

    if gulp.is_blank() {
        Validation::Empty { gulp_id }
    } else {
        Validation::Usable(gulp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(source: &str, raw: &str) -> SourcePayload {
        SourcePayload::parse(source, raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_gulp_and_body() {
        let p = payload("corr17", "42\n9.1 100 0 60000.1 4 120 300.5 12\n");
        assert_eq!(p.gulp_id, 42);
        assert_eq!(p.body, "9.1 100 0 60000.1 4 120 300.5 12\n");
    }

    #[test]
    fn test_parse_header_only() {
        let p = payload("corr17", "42\n");
        assert_eq!(p.gulp_id, 42);
        assert!(p.body.is_empty());

        let p = payload("corr17", "42");
        assert_eq!(p.gulp_id, 42);
    }

    #[test]
    fn test_parse_rejects_non_integer_head() {
        let err = SourcePayload::parse("corr17", b"gulp42\nrows").unwrap_err();
        assert_eq!(err, PayloadError::BadGulpId("gulp42".to_string()));

        let err = SourcePayload::parse("corr17", b"").unwrap_err();
        assert!(matches!(err, PayloadError::BadGulpId(_)));

        let err = SourcePayload::parse("corr17", &[0xff, 0xfe, b'\n']).unwrap_err();
        assert_eq!(err, PayloadError::InvalidUtf8);
    }

    #[test]
    fn test_validate_usable() {
        let payloads = vec![
            payload("a", "42\nrow a"),
            payload("b", "42\nrow b\n"),
            payload("c", "42\n"),
        ];
        match validate(payloads, 3, Utc::now()) {
            Validation::Usable(gulp) => {
                assert_eq!(gulp.gulp_id, 42);
                assert_eq!(gulp.merged_body(), "row a\nrow b");
            }
            other => panic!("expected usable gulp, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_incomplete() {
        let payloads = vec![payload("a", "42\nrow"), payload("b", "42\nrow")];
        match validate(payloads, 3, Utc::now()) {
            Validation::Incomplete { parsed, expected } => {
                assert_eq!(parsed, 2);
                assert_eq!(expected, 3);
            }
            other => panic!("expected incomplete gulp, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_divergent() {
        let payloads = vec![
            payload("a", "42\nrow"),
            payload("b", "42\nrow"),
            payload("c", "43\nrow"),
        ];
        match validate(payloads, 3, Utc::now()) {
            Validation::Divergent { gulp_ids } => {
                assert_eq!(gulp_ids.into_iter().collect::<Vec<_>>(), vec![42, 43]);
            }
            other => panic!("expected divergent gulp, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_whitespace_only_is_empty() {
        let payloads = vec![payload("a", "42\n  \n"), payload("b", "42\n")];
        let validation = validate(payloads, 2, Utc::now());
        assert!(matches!(validation, Validation::Empty { gulp_id: 42 }));
        assert_eq!(validation.gulp_id(), Some(42));
    }
}
