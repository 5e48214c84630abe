//! Crawler phase: run the search form once per listed date and keep each
//! non-empty results table as `{raw}/{YYY}/{MM}/{YYY}-{MM}-{DD}.csv`.

use anyhow::{Context, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::ScheduleError;
use crate::form::{extract_table, FormState, ScheduleTable, SearchPage};
use crate::types::RocDate;
use crate::utils::file_link;

pub const FORM_URL: &str = "https://mort.tainan.gov.tw/Inquire/I101.aspx?mid=1";
const ORIGIN: &str = "https://mort.tainan.gov.tw";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const ACCEPT_LANGUAGE: &str = "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7";

/// Transport for the search form: one GET for the blank form, one POST per search
pub trait FormEndpoint {
    fn load(&self) -> Result<String>;
    fn submit(&self, params: &[(&'static str, String)]) -> Result<String>;
}

/// The live form, behind a cookie-keeping client so every request shares the
/// ASP.NET session
pub struct HttpForm {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpForm {
    pub fn new(url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::ORIGIN, HeaderValue::from_static(ORIGIN));
        headers.insert(
            header::REFERER,
            HeaderValue::from_str(url).context("Invalid form URL")?,
        );

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl FormEndpoint for HttpForm {
    fn load(&self) -> Result<String> {
        self.client
            .get(&self.url)
            .send()
            .with_context(|| format!("Failed to fetch: {}", self.url))?
            .error_for_status()?
            .text()
            .with_context(|| format!("Failed to read response: {}", self.url))
    }

    fn submit(&self, params: &[(&'static str, String)]) -> Result<String> {
        self.client
            .post(&self.url)
            .form(params)
            .send()
            .with_context(|| format!("Failed to post: {}", self.url))?
            .error_for_status()?
            .text()
            .with_context(|| format!("Failed to read response: {}", self.url))
    }
}

/// Which hidden state goes into the next postback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatePolicy {
    /// Echo the values from the initial GET on every search. The Tainan server
    /// validates these per session, not per request.
    #[default]
    ReuseInitial,
    /// Carry forward whatever the latest response served, when it served any
    Rotate,
}

impl StatePolicy {
    fn next(self, current: FormState, refreshed: Option<FormState>) -> FormState {
        match (self, refreshed) {
            (StatePolicy::Rotate, Some(state)) => state,
            _ => current,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub raw_dir: PathBuf,
    pub delay: Duration,
    pub policy: StatePolicy,
}

/// One search response
#[derive(Debug, Clone)]
pub struct Submission {
    pub table: ScheduleTable,
    /// Hidden state served with the response, if any
    pub refreshed: Option<FormState>,
}

pub fn submit_date<E: FormEndpoint>(endpoint: &E, state: &FormState, date: &str) -> Result<Submission> {
    let html = endpoint.submit(&state.search_params(date))?;
    Ok(Submission {
        table: extract_table(&html),
        refreshed: FormState::from_html(&html),
    })
}

#[derive(Debug)]
pub enum DateOutcome {
    Saved { path: PathBuf, rows: usize },
    Empty,
    Failed(anyhow::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub saved: usize,
    pub empty: usize,
    pub failed: usize,
}

impl FetchSummary {
    fn record(&mut self, outcome: &DateOutcome) {
        match outcome {
            DateOutcome::Saved { .. } => self.saved += 1,
            DateOutcome::Empty => self.empty += 1,
            DateOutcome::Failed(_) => self.failed += 1,
        }
    }
}

pub fn csv_path(raw_dir: &Path, date: &RocDate) -> PathBuf {
    raw_dir
        .join(date.year_dir())
        .join(date.month_dir())
        .join(format!("{}.csv", date.date_key()))
}

pub fn write_csv(path: &Path, table: &ScheduleTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to create: {}", path.display()))?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn fetch_date<E: FormEndpoint>(
    endpoint: &E,
    state: &FormState,
    date: &str,
    raw_dir: &Path,
) -> Result<(DateOutcome, Option<FormState>)> {
    let roc = RocDate::parse_compact(date)
        .ok_or_else(|| ScheduleError::InvalidDateValue(date.to_string()))?;

    let submission = submit_date(endpoint, state, date)?;
    if submission.table.is_empty() {
        return Ok((DateOutcome::Empty, submission.refreshed));
    }

    let path = csv_path(raw_dir, &roc);
    write_csv(&path, &submission.table)?;
    let rows = submission.table.rows.len();
    Ok((DateOutcome::Saved { path, rows }, submission.refreshed))
}

/// Fetch the form once, then search each listed date in page order. Only a
/// failure to load or read the initial form is returned as an error.
pub fn run_dates<E: FormEndpoint>(endpoint: &E, config: &FetchConfig) -> Result<FetchSummary> {
    let html = endpoint.load().context("Error fetching initial page")?;
    let page = SearchPage::parse(&html).context("Error reading initial page")?;
    info!(dates = page.dates.len(), "search form loaded");
    println!("Found {} dates", page.dates.len());

    let mut state = page.state;
    let mut summary = FetchSummary::default();

    for (i, date) in page.dates.iter().enumerate() {
        if i > 0 && !config.delay.is_zero() {
            thread::sleep(config.delay);
        }

        let outcome = match fetch_date(endpoint, &state, date, &config.raw_dir) {
            Ok((outcome, refreshed)) => {
                state = config.policy.next(state, refreshed);
                outcome
            }
            Err(e) => DateOutcome::Failed(e),
        };

        match &outcome {
            DateOutcome::Saved { path, rows } => {
                debug!(date = %date, rows, "saved");
                println!("Saved CSV data for date {} to {}", date, file_link(path));
            }
            DateOutcome::Empty => println!("No data found for date {}", date),
            DateOutcome::Failed(e) => error!("Error submitting search for date {}: {:#}", date, e),
        }
        summary.record(&outcome);
    }

    println!(
        "Completed fetching all dates ({} saved, {} empty, {} failed)",
        summary.saved, summary.empty, summary.failed
    );
    Ok(summary)
}

pub fn run_fetch(url: &str, config: &FetchConfig) -> Result<()> {
    let endpoint = HttpForm::new(url)?;
    run_dates(&endpoint, config)?;
    Ok(())
}
