pub mod cluster;
pub mod filter;
pub mod parse;

pub use cluster::{Clusterer, FriendsOfFriends};
pub use parse::parse_candidates;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while turning a gulp body into filtered candidates.
#[derive(Debug, Error, PartialEq)]
pub enum ProcessingError {
    #[error("overflowing value in column '{column}': {value}")]
    Overflow { column: &'static str, value: String },

    #[error("malformed candidate on line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// One detector candidate. Column order matches the detector's table:
/// `snr if specnum mjds ibox idm dm ibeam`. The cluster fields are filled in
/// by clustering and peak selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub snr: f64,
    /// Sample index of the candidate within the gulp.
    pub itime: i64,
    pub specnum: i64,
    pub mjds: f64,
    pub ibox: u32,
    pub idm: u32,
    pub dm: f64,
    pub ibeam: u32,
    #[serde(default)]
    pub cl: usize,
    #[serde(default)]
    pub cntc: usize,
    #[serde(default)]
    pub cntb: usize,
}

impl CandidateRow {
    pub fn new(snr: f64, itime: i64, ibox: u32, dm: f64, ibeam: u32) -> Self {
        Self {
            snr,
            itime,
            specnum: 0,
            mjds: 0.0,
            ibox,
            idm: 0,
            dm,
            ibeam,
            cl: 0,
            cntc: 0,
            cntb: 0,
        }
    }
}
