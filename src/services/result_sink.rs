use std::{
    collections::BTreeSet,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use regex::Regex;
use rust_xlsxwriter::{Workbook, XlsxError};
use serde::Serialize;
use thiserror::Error;

use crate::domain::schema::{ExtractionResult, RecordSchema};

/// Runs that may start within one second before a save gives up.
const MAX_RUNS_PER_SECOND: u32 = 1_000;

const URL_PATTERN: &str =
    r"http[s]?://(?:[a-zA-Z]|[0-9]|[$-_@.&+]|[!*\(\),]|(?:%[0-9a-fA-F][0-9a-fA-F]))+";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("no free run name left for {0}")]
    Exhausted(RunTimestamp),
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("record {index} has columns {found:?}, expected {expected:?}")]
    Ragged {
        index: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("{0} already exists")]
    Exists(PathBuf),
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),
}

/// Names every artifact of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RunTimestamp(String);

impl RunTimestamp {
    pub fn now() -> Self {
        Self::from_datetime(Local::now())
    }

    pub fn from_datetime(at: DateTime<Local>) -> Self {
        RunTimestamp(at.format("%Y%m%d_%H%M%S").to_string())
    }

    /// Accepts the `YYYYmmdd_HHMMSS` shape used in file names, optionally
    /// followed by `_N` for later runs within the same second.
    pub fn parse(raw: &str) -> Option<Self> {
        let (stamp, sequence) = match raw.get(15..) {
            Some("") => (raw, None),
            Some(rest) => (&raw[..15], Some(rest.strip_prefix('_')?)),
            None => return None,
        };
        let stamp_valid = stamp.char_indices().all(|(i, c)| match i {
            8 => c == '_',
            _ => c.is_ascii_digit(),
        });
        let sequence_valid =
            sequence.map_or(true, |n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
        (stamp_valid && sequence_valid).then(|| RunTimestamp(raw.to_string()))
    }

    /// The name of the `sequence`-th later run started in the same second.
    pub fn with_sequence(&self, sequence: u32) -> Self {
        let stamp = self.0.get(..15).unwrap_or(&self.0);
        RunTimestamp(format!("{}_{}", stamp, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StructuredArtifacts {
    pub json: PathBuf,
    pub table: Option<PathBuf>,
    pub table_error: Option<String>,
}

/// Writes run artifacts under one output directory. Nothing is overwritten:
/// every file name carries the run timestamp.
pub struct ResultSink {
    output_dir: PathBuf,
}

impl ResultSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        ResultSink {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn raw_path(&self, timestamp: &RunTimestamp) -> PathBuf {
        self.output_dir.join(format!("rawData_{}.md", timestamp))
    }

    /// Writes the raw text under the first free run name derived from
    /// `timestamp` and returns that name with the path. Every later artifact
    /// of the run uses the returned name.
    pub fn save_raw(
        &self,
        text: &str,
        timestamp: &RunTimestamp,
    ) -> Result<(RunTimestamp, PathBuf), PersistenceError> {
        self.ensure_output_dir()?;

        let mut candidate = timestamp.clone();
        for sequence in 1..=MAX_RUNS_PER_SECOND {
            let path = self.raw_path(&candidate);
            match create_new(&path, text) {
                Ok(()) => {
                    log::info!("Raw data saved to {}", path.display());
                    return Ok((candidate, path));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = timestamp.with_sequence(sequence);
                }
                Err(source) => return Err(PersistenceError::Io { path, source }),
            }
        }

        Err(PersistenceError::Exhausted(timestamp.clone()))
    }

    /// Writes the JSON artifact, then the spreadsheet. A spreadsheet failure is
    /// reported in the returned artifacts and does not discard the JSON.
    pub fn save_structured(
        &self,
        result: &ExtractionResult,
        schema: &RecordSchema,
        timestamp: &RunTimestamp,
    ) -> Result<StructuredArtifacts, PersistenceError> {
        let json_path = self
            .output_dir
            .join(format!("sorted_data_{}.json", timestamp));
        let json = serde_json::to_string_pretty(result)?;
        self.ensure_output_dir()?;
        create_new(&json_path, &json).map_err(|source| PersistenceError::Io {
            path: json_path.clone(),
            source,
        })?;
        log::info!("Formatted data saved to JSON at {}", json_path.display());

        let table_path = self
            .output_dir
            .join(format!("sorted_data_{}.xlsx", timestamp));
        let (table, table_error) = match write_table(result, schema, &table_path) {
            Ok(()) => {
                log::info!("Formatted data saved to Excel at {}", table_path.display());
                (Some(table_path), None)
            }
            Err(e) => {
                log::error!("Error creating table or saving Excel: {}", e);
                (None, Some(e.to_string()))
            }
        };

        Ok(StructuredArtifacts {
            json: json_path,
            table,
            table_error,
        })
    }

    /// Writes a `_cleaned` sibling of `path` with every URL removed and returns
    /// the sibling's path and content. The original file is left untouched.
    pub fn strip_urls(&self, path: &Path) -> Result<(PathBuf, String), PersistenceError> {
        let content = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cleaned = remove_urls(&content);

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = match path.extension() {
            Some(ext) => format!("{}_cleaned.{}", stem, ext.to_string_lossy()),
            None => format!("{}_cleaned", stem),
        };
        let cleaned_path = path.with_file_name(file_name);

        self.ensure_output_dir()?;
        fs::write(&cleaned_path, &cleaned).map_err(|source| PersistenceError::Io {
            path: cleaned_path.clone(),
            source,
        })?;
        log::info!("Cleaned file saved as: {}", cleaned_path.display());
        Ok((cleaned_path, cleaned))
    }

    fn ensure_output_dir(&self) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| PersistenceError::Io {
            path: self.output_dir.clone(),
            source,
        })
    }
}

/// Fails with `AlreadyExists` instead of truncating an earlier file.
fn create_new(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(content.as_bytes())
}

pub fn remove_urls(text: &str) -> String {
    match Regex::new(URL_PATTERN) {
        Ok(pattern) => pattern.replace_all(text, "").into_owned(),
        Err(e) => {
            log::error!("Invalid url pattern: {}", e);
            text.to_string()
        }
    }
}

/// Columns are the schema's fields in order, followed by any extra keys.
/// Every record must carry exactly the same key set.
fn table_columns(
    result: &ExtractionResult,
    schema: &RecordSchema,
) -> Result<Vec<String>, TableError> {
    let Some(first) = result.listings.first() else {
        return Ok(schema.fields().to_vec());
    };
    let expected: BTreeSet<&String> = first.keys().collect();

    for (index, record) in result.listings.iter().enumerate().skip(1) {
        let found: BTreeSet<&String> = record.keys().collect();
        if found != expected {
            return Err(TableError::Ragged {
                index,
                expected: expected.iter().map(|k| k.to_string()).collect(),
                found: found.iter().map(|k| k.to_string()).collect(),
            });
        }
    }

    let mut columns = schema.fields().to_vec();
    columns.extend(
        expected
            .into_iter()
            .filter(|k| !schema.fields().contains(*k))
            .cloned(),
    );
    Ok(columns)
}

fn write_table(
    result: &ExtractionResult,
    schema: &RecordSchema,
    path: &Path,
) -> Result<(), TableError> {
    let columns = table_columns(result, schema)?;
    if path.exists() {
        return Err(TableError::Exists(path.to_path_buf()));
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string(0, col as u16, name)?;
    }
    for (row, record) in result.listings.iter().enumerate() {
        for (col, name) in columns.iter().enumerate() {
            worksheet.write_string(row as u32 + 1, col as u16, record.get(name).unwrap_or(""))?;
        }
    }
    workbook.save(path)?;
    Ok(())
}
