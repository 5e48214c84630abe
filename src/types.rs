//! Schedule record types shared by the crawler and the transformer

use serde::{Deserialize, Serialize};
use std::fmt;

pub const FIELD_DATE: &str = "日期";
pub const FIELD_TIME: &str = "公祭時間";
pub const FIELD_LOCATION: &str = "公祭地點";
pub const FIELD_WREATH: &str = "輓額";
pub const FIELD_DECEASED: &str = "往生者";
pub const FIELD_GENDER: &str = "性別";
pub const FIELD_BIRTH_YEAR: &str = "年次";
pub const FIELD_ADDRESS: &str = "戶籍地";
pub const FIELD_SID: &str = "SID";

/// Columns a scraped CSV must carry, looked up by header text
pub const REQUIRED_FIELDS: [&str; 9] = [
    FIELD_DATE,
    FIELD_TIME,
    FIELD_LOCATION,
    FIELD_WREATH,
    FIELD_DECEASED,
    FIELD_GENDER,
    FIELD_BIRTH_YEAR,
    FIELD_ADDRESS,
    FIELD_SID,
];

/// Republic-of-China calendar date. The year is kept as-is (e.g. 114), never
/// converted to Gregorian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RocDate {
    pub year: u32,
    pub month: u32,
    pub day: u32,
}

fn digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl RocDate {
    /// Parse the table form "114/05/05" (exactly 3/2/2 ASCII digits)
    pub fn parse_slashed(s: &str) -> Option<Self> {
        let mut parts = s.split('/');
        let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || y.len() != 3 || m.len() != 2 || d.len() != 2 {
            return None;
        }
        Some(Self {
            year: digits(y)?,
            month: digits(m)?,
            day: digits(d)?,
        })
    }

    /// Parse a dropdown option value like "1140505" by slicing it 3/2/2
    pub fn parse_compact(s: &str) -> Option<Self> {
        Some(Self {
            year: digits(s.get(0..3)?)?,
            month: digits(s.get(3..5)?)?,
            day: digits(s.get(5..7)?)?,
        })
    }

    /// "114-05-05", used for file names and the JSON `date` field
    pub fn date_key(&self) -> String {
        format!("{:03}-{:02}-{:02}", self.year, self.month, self.day)
    }

    pub fn year_dir(&self) -> String {
        format!("{:03}", self.year)
    }

    pub fn month_dir(&self) -> String {
        format!("{:02}", self.month)
    }
}

impl fmt::Display for RocDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

/// One scraped schedule row, fields already trimmed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub date: String,
    pub time: String,
    pub location: String,
    pub wreath: String,
    pub deceased: String,
    pub gender: String,
    pub birth_year: String,
    pub address: String,
    pub sid: String,
}

/// A row that resolved to a venue code, in output field order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MourningRecord {
    pub code: String,
    #[serde(rename = "公祭時間")]
    pub time: String,
    #[serde(rename = "公祭地點")]
    pub location: String,
    #[serde(rename = "輓額")]
    pub wreath: String,
    #[serde(rename = "往生者")]
    pub deceased: String,
    #[serde(rename = "性別")]
    pub gender: String,
    #[serde(rename = "年次")]
    pub birth_year: String,
    #[serde(rename = "戶籍地")]
    pub address: String,
    #[serde(rename = "SID")]
    pub sid: String,
}

impl MourningRecord {
    pub fn from_raw(raw: &RawRecord, code: &str) -> Self {
        Self {
            code: code.to_string(),
            time: raw.time.clone(),
            location: raw.location.clone(),
            wreath: raw.wreath.clone(),
            deceased: raw.deceased.clone(),
            gender: raw.gender.clone(),
            birth_year: raw.birth_year.clone(),
            address: raw.address.clone(),
            sid: raw.sid.clone(),
        }
    }
}

/// Contents of one `{year}/{date}.json` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFile {
    pub date: String,
    pub count: usize,
    pub records: Vec<MourningRecord>,
}
