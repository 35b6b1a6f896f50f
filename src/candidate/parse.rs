use super::{CandidateRow, ProcessingError};
use crate::config::types::ParseErrorStrategy;
use std::num::IntErrorKind;
use std::str::FromStr;
use tracing::warn;

const COLUMNS: usize = 8;

/// Parse a whitespace-separated candidate table.
///
/// Overflowing values always fail the whole table. Rows that are otherwise
/// malformed are skipped or fail the table depending on `on_error`.
pub fn parse_candidates(
    text: &str,
    on_error: ParseErrorStrategy,
) -> Result<Vec<CandidateRow>, ProcessingError> {
    let mut rows = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        match parse_row(line, line_no) {
            Ok(row) => rows.push(row),
            Err(e @ ProcessingError::Overflow { .. }) => return Err(e),
            Err(e) => match on_error {
                ParseErrorStrategy::Drop => {
                    warn!(line = line_no, error = %e, "Dropping malformed candidate");
                }
                ParseErrorStrategy::Abort => return Err(e),
            },
        }
    }

    Ok(rows)
}

fn parse_row(line: &str, line_no: usize) -> Result<CandidateRow, ProcessingError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != COLUMNS {
        return Err(ProcessingError::Malformed {
            line: line_no,
            message: format!("expected {} columns, found {}", COLUMNS, fields.len()),
        });
    }

    Ok(CandidateRow {
        snr: parse_float(fields[0], "snr", line_no)?,
        itime: parse_int(fields[1], "if", line_no)?,
        specnum: parse_int(fields[2], "specnum", line_no)?,
        mjds: parse_float(fields[3], "mjds", line_no)?,
        ibox: parse_int(fields[4], "ibox", line_no)?,
        idm: parse_int(fields[5], "idm", line_no)?,
        dm: parse_float(fields[6], "dm", line_no)?,
        ibeam: parse_int(fields[7], "ibeam", line_no)?,
        cl: 0,
        cntc: 0,
        cntb: 0,
    })
}

fn parse_int<T>(raw: &str, column: &'static str, line: usize) -> Result<T, ProcessingError>
where
    T: FromStr<Err = std::num::ParseIntError>,
{
    raw.parse::<T>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => ProcessingError::Overflow {
            column,
            value: raw.to_string(),
        },
        _ => ProcessingError::Malformed {
            line,
            message: format!("invalid {} '{}': {}", column, raw, e),
        },
    })
}

fn parse_float(raw: &str, column: &'static str, line: usize) -> Result<f64, ProcessingError> {
    let value = raw.parse::<f64>().map_err(|e| ProcessingError::Malformed {
        line,
        message: format!("invalid {} '{}': {}", column, raw, e),
    })?;

    if value.is_finite() {
        Ok(value)
    } else {
        Err(ProcessingError::Overflow {
            column,
            value: raw.to_string(),
        })
    }
}
