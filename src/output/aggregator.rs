use crate::candidate::filter::select_for_output;
use crate::candidate::CandidateRow;
use crate::engine::TriggerMark;
use crate::mjd::mjd_day;
use crate::output::write_atomic;
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const CSV_HEADER: &str = "snr,if,specnum,mjds,ibox,idm,dm,ibeam,cl,cntc,cntb,trigger";

const AGGREGATE_FILE: &str = "cluster_output.csv";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Files touched while recording one gulp.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputReport {
    pub batch_file: PathBuf,
    pub day_file: PathBuf,
    pub aggregate_file: PathBuf,
    pub rows_written: usize,
}

/// Keeps the per-gulp, per-day and rolling two-day candidate files.
#[derive(Debug)]
pub struct OutputAggregator {
    root: PathBuf,
    last_suffix: i64,
}

impl OutputAggregator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_suffix: i64::MIN,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn aggregate_path(&self) -> PathBuf {
        self.root.join(AGGREGATE_FILE)
    }

    pub fn day_path(&self, day: i64) -> PathBuf {
        self.root.join(format!("{}.csv", day))
    }

    /// Record a gulp's peak rows. Returns `None` when no row clears
    /// `min_snr` and nothing was written.
    pub fn record(
        &mut self,
        peaks: &[(CandidateRow, TriggerMark)],
        min_snr: f64,
        max_ncl: usize,
        now: DateTime<Utc>,
    ) -> Result<Option<OutputReport>, OutputError> {
        let selected = select_for_output(peaks, min_snr, max_ncl);
        if selected.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(&self.root).map_err(io_error(&self.root))?;

        let lines: String = selected
            .iter()
            .map(|(row, mark)| format_row(row, mark) + "\n")
            .collect();

        let batch_file = self.next_batch_path(now);
        write_atomic(&batch_file, lines.as_bytes()).map_err(io_error(&batch_file))?;

        let day = mjd_day(now);
        let day_file = self.day_path(day);
        append_with_header(&day_file, &lines)?;

        let aggregate_file = self.aggregate_path();
        self.rebuild_aggregate(&self.day_path(day - 1), &day_file, &aggregate_file)?;

        debug!(
            batch_file = %batch_file.display(),
            rows = selected.len(),
            "Wrote clustered candidates"
        );

        Ok(Some(OutputReport {
            batch_file,
            day_file,
            aggregate_file,
            rows_written: selected.len(),
        }))
    }

    /// Per-gulp file named by wall-clock seconds, bumped if a second is reused.
    fn next_batch_path(&mut self, now: DateTime<Utc>) -> PathBuf {
        let suffix = now.timestamp().max(self.last_suffix.saturating_add(1));
        self.last_suffix = suffix;
        self.root.join(format!("cluster_output{}.cand", suffix))
    }

    fn rebuild_aggregate(&self, previous: &Path, current: &Path, target: &Path) -> Result<(), OutputError> {
        let mut merged = String::from(CSV_HEADER);
        merged.push('\n');

        match fs::read_to_string(previous) {
            Ok(text) => push_data_lines(&mut merged, &text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %previous.display(), error = %e, "Previous day file unreadable, aggregating current day only");
            }
        }

        let text = fs::read_to_string(current).map_err(io_error(current))?;
        push_data_lines(&mut merged, &text);

        write_atomic(target, merged.as_bytes()).map_err(io_error(target))
    }
}

fn push_data_lines(out: &mut String, text: &str) {
    for line in text.lines() {
        if line.trim().is_empty() || line == CSV_HEADER {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
}

/// Append `lines` to a day file. A new file starts with the header. A file
/// that lacks one (written by something else) is rewritten once with the
/// header in front; after that every batch is a plain append.
fn append_with_header(path: &Path, lines: &str) -> Result<(), OutputError> {
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
        .map_err(io_error(path))?;

    let len = file.metadata().map_err(io_error(path))?.len();
    let mut contents = String::with_capacity(lines.len() + CSV_HEADER.len() + 2);

    if len == 0 {
        contents.push_str(CSV_HEADER);
        contents.push('\n');
    } else {
        let mut first = String::new();
        BufReader::new(&file).read_line(&mut first).map_err(io_error(path))?;
        if first.trim_end_matches(['\n', '\r']) != CSV_HEADER {
            drop(file);
            return prepend_header(path, lines);
        }

        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1)).map_err(io_error(path))?;
        file.read_exact(&mut last).map_err(io_error(path))?;
        if last[0] != b'\n' {
            contents.push('\n');
        }
    }

    contents.push_str(lines);
    file.write_all(contents.as_bytes()).map_err(io_error(path))?;
    file.flush().map_err(io_error(path))
}

fn prepend_header(path: &Path, lines: &str) -> Result<(), OutputError> {
    let existing = fs::read_to_string(path).map_err(io_error(path))?;
    let mut contents = String::with_capacity(existing.len() + lines.len() + CSV_HEADER.len() + 2);
    contents.push_str(CSV_HEADER);
    contents.push('\n');
    contents.push_str(&existing);
    if !existing.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(lines);
    write_atomic(path, contents.as_bytes()).map_err(io_error(path))
}

fn format_row(row: &CandidateRow, mark: &TriggerMark) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{},{},{}",
        row.snr,
        row.itime,
        row.specnum,
        row.mjds,
        row.ibox,
        row.idm,
        row.dm,
        row.ibeam,
        row.cl,
        row.cntc,
        row.cntb,
        mark
    )
}
