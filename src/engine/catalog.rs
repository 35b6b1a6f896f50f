use crate::candidate::CandidateRow;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read source catalog '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("source catalog line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// A persistent, non-transient source seen at a known beam and DM.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownSource {
    pub name: String,
    pub ibeam: u32,
    pub dm: f64,
}

/// Known sources used to reject triggers on things that are not new.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    path: Option<PathBuf>,
    sources: Vec<KnownSource>,
    dm_tolerance: f64,
}

impl SourceCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load `name ibeam dm` lines; blank lines and `#` comments are skipped.
    pub fn load(path: &Path, dm_tolerance: f64) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut catalog = Self::parse(&text, dm_tolerance)?;
        catalog.path = Some(path.to_path_buf());
        Ok(catalog)
    }

    pub fn parse(text: &str, dm_tolerance: f64) -> Result<Self, CatalogError> {
        let mut sources = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            let &[name, ibeam, dm] = fields.as_slice() else {
                return Err(CatalogError::Malformed {
                    line: idx + 1,
                    message: format!("expected 'name ibeam dm', found {} fields", fields.len()),
                });
            };

            let malformed = |what: &str| CatalogError::Malformed {
                line: idx + 1,
                message: format!("invalid {}", what),
            };
            sources.push(KnownSource {
                name: name.to_string(),
                ibeam: ibeam.parse().map_err(|_| malformed("ibeam"))?,
                dm: dm.parse().map_err(|_| malformed("dm"))?,
            });
        }

        Ok(Self {
            path: None,
            sources,
            dm_tolerance,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The known source this candidate coincides with, if any.
    pub fn matching(&self, row: &CandidateRow) -> Option<&KnownSource> {
        self.sources
            .iter()
            .find(|s| s.ibeam == row.ibeam && (s.dm - row.dm).abs() <= self.dm_tolerance)
    }
}
