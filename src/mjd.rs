use chrono::{DateTime, Utc};

/// MJD of the Unix epoch.
const UNIX_EPOCH_MJD: f64 = 40587.0;
const SECONDS_PER_DAY: f64 = 86400.0;

/// Modified Julian Date of a UTC instant.
pub fn mjd(t: DateTime<Utc>) -> f64 {
    let seconds = t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) * 1e-9;
    UNIX_EPOCH_MJD + seconds / SECONDS_PER_DAY
}

/// Integer day number used to key daily files.
pub fn mjd_day(t: DateTime<Utc>) -> i64 {
    mjd(t).floor() as i64
}
