use crate::types::{WqError, WqResult};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Format of the sensing-start token in WFR product names
pub const TOKEN_FORMAT: &str = "%Y%m%dT%H%M%S";

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // S3A_OL_2_WFR____20191002T140633_20191002T140933_..._subset.csv
        Regex::new(r"____(\d{8}T\d{6})").expect("valid acquisition token pattern")
    })
}

/// Identity of one acquisition, parsed from its file name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Acquisition {
    pub datetime: NaiveDateTime,
    pub filename: String,
}

impl Acquisition {
    pub fn from_path<P: AsRef<Path>>(path: P) -> WqResult<Self> {
        let filename = path
            .as_ref()
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                WqError::InvalidFormat(format!("No file name in '{}'", path.as_ref().display()))
            })?
            .to_string();
        Self::from_filename(&filename)
    }

    pub fn from_filename(filename: &str) -> WqResult<Self> {
        let token = token_pattern()
            .captures(filename)
            .and_then(|c| c.get(1))
            .ok_or_else(|| {
                WqError::InvalidFormat(format!("No acquisition time token in '{}'", filename))
            })?;
        let datetime = NaiveDateTime::parse_from_str(token.as_str(), TOKEN_FORMAT).map_err(|e| {
            WqError::InvalidFormat(format!("Bad acquisition time '{}': {}", token.as_str(), e))
        })?;
        Ok(Self {
            datetime,
            filename: filename.to_string(),
        })
    }

    /// The `YYYYMMDDTHHMMSS` token as written in the file name
    pub fn date_string(&self) -> String {
        self.datetime.format(TOKEN_FORMAT).to_string()
    }

    pub fn date(&self) -> NaiveDate {
        self.datetime.date()
    }

    /// Noon of the acquisition day, the key of the daily CAMS reference
    pub fn cams_key(&self) -> NaiveDateTime {
        self.date().and_time(NaiveTime::MIN) + Duration::hours(12)
    }

    /// File name without its extension
    pub fn stem(&self) -> &str {
        match self.filename.rfind('.') {
            Some(idx) if idx > 0 => &self.filename[..idx],
            _ => &self.filename,
        }
    }
}
