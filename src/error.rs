use thiserror::Error;

/// Domain conditions that callers branch on. Everything else travels as
/// `anyhow::Error` with context attached.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("hidden form field '{0}' not found on the search page")]
    MissingHiddenField(&'static str),

    #[error("field '{field}' not found in {path}")]
    MissingColumn { field: &'static str, path: String },

    #[error("date value '{0}' is not a YYYMMDD date")]
    InvalidDateValue(String),

    #[error("no records scanned")]
    NoData,
}
