//! Grouping classified rows into per-date buckets

use std::collections::BTreeMap;
use std::ops::AddAssign;
use tracing::debug;

use crate::error::ScheduleError;
use crate::types::{DateFile, MourningRecord, RawRecord, RocDate};
use crate::venue::VenueClassifier;

/// Row counters behind the coverage figure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageStats {
    /// Rows with a non-empty location
    pub total: usize,
    /// Rows that resolved to a venue code, whether or not their date parsed
    pub classified: usize,
}

impl CoverageStats {
    /// Classified share as a percentage rounded to two decimals
    pub fn coverage(&self) -> Result<f64, ScheduleError> {
        if self.total == 0 {
            return Err(ScheduleError::NoData);
        }
        let percent = self.classified as f64 / self.total as f64 * 100.0;
        Ok((percent * 100.0).round() / 100.0)
    }

    pub fn coverage_label(&self) -> String {
        match self.coverage() {
            Ok(percent) => format!("{:.2}%", percent),
            Err(_) => "no data".to_string(),
        }
    }
}

impl AddAssign for CoverageStats {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.classified += other.classified;
    }
}

/// What happened to a single row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Empty location, not counted
    Blank,
    Unclassified,
    /// Classified but the date did not parse, so it lands in no bucket
    Undated { code: String },
    Bucketed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateBucket {
    pub date: RocDate,
    pub records: Vec<MourningRecord>,
}

impl DateBucket {
    pub fn date_key(&self) -> String {
        self.date.date_key()
    }

    pub fn to_file(&self) -> DateFile {
        DateFile {
            date: self.date_key(),
            count: self.records.len(),
            records: self.records.clone(),
        }
    }
}

/// Result of aggregating a batch of rows: ROC year -> date key -> bucket
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub buckets: BTreeMap<u32, BTreeMap<String, DateBucket>>,
    pub stats: CoverageStats,
}

impl Aggregation {
    pub fn iter(&self) -> impl Iterator<Item = &DateBucket> {
        self.buckets.values().flat_map(|days| days.values())
    }

    pub fn record_count(&self) -> usize {
        self.iter().map(|b| b.records.len()).sum()
    }
}

pub struct RecordAggregator<'a> {
    classifier: &'a VenueClassifier,
    result: Aggregation,
}

impl<'a> RecordAggregator<'a> {
    pub fn new(classifier: &'a VenueClassifier) -> Self {
        Self {
            classifier,
            result: Aggregation::default(),
        }
    }

    pub fn push(&mut self, raw: &RawRecord) -> RowOutcome {
        let location = raw.location.trim();
        if location.is_empty() {
            return RowOutcome::Blank;
        }
        self.result.stats.total += 1;

        let Some(code) = self.classifier.classify(location) else {
            return RowOutcome::Unclassified;
        };
        // Counted before the date is checked, so an undated row still adds to coverage
        self.result.stats.classified += 1;

        let Some(date) = RocDate::parse_slashed(raw.date.trim()) else {
            return RowOutcome::Undated {
                code: code.to_string(),
            };
        };

        let mut record = MourningRecord::from_raw(raw, code);
        record.location = location.to_string();

        self.result
            .buckets
            .entry(date.year)
            .or_default()
            .entry(date.date_key())
            .or_insert_with(|| DateBucket {
                date,
                records: Vec::new(),
            })
            .records
            .push(record);

        RowOutcome::Bucketed
    }

    /// Sort every bucket by mourning time and hand back the result
    pub fn finish(mut self) -> Aggregation {
        for days in self.result.buckets.values_mut() {
            for bucket in days.values_mut() {
                bucket.records.sort_by(|a, b| a.time.cmp(&b.time));
            }
        }
        self.result
    }
}

pub fn aggregate<'r>(
    classifier: &VenueClassifier,
    rows: impl IntoIterator<Item = &'r RawRecord>,
) -> Aggregation {
    let mut aggregator = RecordAggregator::new(classifier);
    for row in rows {
        match aggregator.push(row) {
            RowOutcome::Unclassified => debug!(location = %row.location, "no venue code"),
            RowOutcome::Undated { code } => {
                debug!(code = %code, date = %row.date, "classified row has no usable date")
            }
            RowOutcome::Blank | RowOutcome::Bucketed => {}
        }
    }
    aggregator.finish()
}
