//! Transformer phase: classify every scraped CSV row and write one JSON file
//! per date under `{output}/{year}/{date}.json`.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::aggregate::{aggregate, CoverageStats, DateBucket};
use crate::error::ScheduleError;
use crate::types::{RawRecord, REQUIRED_FIELDS};
use crate::utils::file_link;
use crate::venue::VenueClassifier;

/// Positions of the required fields in a CSV header, in `REQUIRED_FIELDS` order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex([usize; 9]);

impl ColumnIndex {
    pub fn from_headers(headers: &csv::StringRecord, path: &Path) -> Result<Self, ScheduleError> {
        let mut positions = [0usize; 9];
        for (slot, field) in positions.iter_mut().zip(REQUIRED_FIELDS) {
            *slot = headers
                .iter()
                .position(|h| h == field)
                .ok_or_else(|| ScheduleError::MissingColumn {
                    field,
                    path: path.display().to_string(),
                })?;
        }
        Ok(Self(positions))
    }

    pub fn record(&self, row: &csv::StringRecord) -> RawRecord {
        let cell = |n: usize| row.get(self.0[n]).unwrap_or_default().trim().to_string();
        RawRecord {
            date: cell(0),
            time: cell(1),
            location: cell(2),
            wreath: cell(3),
            deceased: cell(4),
            gender: cell(5),
            birth_year: cell(6),
            address: cell(7),
            sid: cell(8),
        }
    }
}

/// Read every row of a scraped CSV. A missing required column fails with
/// `ScheduleError::MissingColumn`; an unreadable row is logged and skipped.
pub fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header: {}", path.display()))?
        .clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    let columns = ColumnIndex::from_headers(&headers, path)?;

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        match row {
            Ok(row) => records.push(columns.record(&row)),
            Err(e) => warn!("Skipping row {} of {}: {}", line + 2, path.display(), e),
        }
    }
    Ok(records)
}

/// Write one date's records, replacing any previous file for that date
pub fn write_date_file(output_dir: &Path, bucket: &DateBucket) -> Result<PathBuf> {
    let dir = output_dir.join(bucket.date.year.to_string());
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    let path = dir.join(format!("{}.json", bucket.date_key()));

    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    bucket.to_file().serialize(&mut serializer)?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &buf).with_context(|| format!("Failed to write: {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("Failed to replace: {}", path.display()))?;
    Ok(path)
}

#[derive(Debug)]
pub enum FileOutcome {
    Processed {
        stats: CoverageStats,
        written: Vec<PathBuf>,
    },
    /// File lacks a required column; nothing read from it
    Skipped(ScheduleError),
    Failed(anyhow::Error),
}

pub fn process_file(classifier: &VenueClassifier, path: &Path, output_dir: &Path) -> FileOutcome {
    let rows = match read_records(path) {
        Ok(rows) => rows,
        Err(e) => {
            return match e.downcast::<ScheduleError>() {
                Ok(reason) => FileOutcome::Skipped(reason),
                Err(e) => FileOutcome::Failed(e),
            }
        }
    };

    let result = aggregate(classifier, &rows);
    debug!(path = %path.display(), rows = rows.len(), records = result.record_count(), "aggregated");
    let mut written = Vec::new();
    for bucket in result.iter() {
        match write_date_file(output_dir, bucket) {
            Ok(path) => {
                println!("Created: {} ({} records)", file_link(&path), bucket.records.len());
                written.push(path);
            }
            Err(e) => error!("Failed to write {}: {:#}", bucket.date_key(), e),
        }
    }

    FileOutcome::Processed {
        stats: result.stats,
        written,
    }
}

/// All `.csv` files under `root`, sorted by path
pub fn find_csv_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub files: usize,
    pub skipped: usize,
    pub failed: usize,
    pub written: Vec<PathBuf>,
    pub stats: CoverageStats,
}

pub fn scan(classifier: &VenueClassifier, raw_dir: &Path, output_dir: &Path) -> ScanSummary {
    if !raw_dir.is_dir() {
        warn!("Input directory {} does not exist", raw_dir.display());
    }

    let mut summary = ScanSummary::default();
    for path in find_csv_files(raw_dir) {
        summary.files += 1;
        match process_file(classifier, &path, output_dir) {
            FileOutcome::Processed { stats, written } => {
                summary.stats += stats;
                summary.written.extend(written);
            }
            FileOutcome::Skipped(reason) => {
                warn!("Warning: {}", reason);
                summary.skipped += 1;
            }
            FileOutcome::Failed(e) => {
                error!("Error processing {}: {:#}", path.display(), e);
                summary.failed += 1;
            }
        }
    }
    summary
}

pub fn run_transform(raw_dir: &Path, output_dir: &Path) -> Result<()> {
    let classifier = VenueClassifier::standard();
    debug!(rules = classifier.rules().len(), "venue table loaded");

    println!("Generating memorial JSON files...");
    println!("{}", "=".repeat(51));

    let summary = scan(&classifier, raw_dir, output_dir);

    println!("Processed {} CSV files", summary.files);
    if summary.skipped + summary.failed > 0 {
        println!("Skipped {} files, failed {}", summary.skipped, summary.failed);
    }
    println!("Wrote {} JSON files", summary.written.len());
    println!("Total records: {}", summary.stats.total);
    println!("Records with venue codes: {}", summary.stats.classified);
    println!("Coverage: {}", summary.stats.coverage_label());
    println!("\nJSON files generated in {}/", output_dir.display());
    Ok(())
}
