use crate::io::acquisition::Acquisition;
use crate::types::{WqError, WqResult};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::path::Path;

pub const DATETIME_COLUMN: &str = "Datetime";
pub const AOD865_COLUMN: &str = "AOD865";

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y%m%dT%H%M%S"];

/// Daily CAMS aerosol optical depth at 865 nm, keyed by timestamp
#[derive(Debug, Clone, Default)]
pub struct CamsTable {
    aod865: BTreeMap<NaiveDateTime, f64>,
}

impl CamsTable {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDateTime, f64)>,
    {
        Self {
            aod865: records.into_iter().collect(),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> WqResult<Self> {
        log::info!("Reading CAMS reference: {}", path.as_ref().display());
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let headers = reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| WqError::Schema(format!("CAMS table has no '{}' column", name)))
        };
        let dt_idx = position(DATETIME_COLUMN)?;
        let aod_idx = position(AOD865_COLUMN)?;

        let mut aod865 = BTreeMap::new();
        for (row, result) in reader.records().enumerate() {
            let record = result?;
            let raw_dt = record.get(dt_idx).unwrap_or("").trim();
            let raw_aod = record.get(aod_idx).unwrap_or("").trim();
            let datetime = parse_datetime(raw_dt).ok_or_else(|| {
                WqError::InvalidFormat(format!("CAMS row {}: bad datetime '{}'", row, raw_dt))
            })?;
            let value: f64 = raw_aod.parse().map_err(|_| {
                WqError::InvalidFormat(format!("CAMS row {}: bad AOD865 '{}'", row, raw_aod))
            })?;
            aod865.insert(datetime, value);
        }
        log::debug!("Loaded {} CAMS records", aod865.len());
        Ok(Self { aod865 })
    }

    pub fn len(&self) -> usize {
        self.aod865.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aod865.is_empty()
    }

    pub fn get(&self, at: &NaiveDateTime) -> Option<f64> {
        self.aod865.get(at).copied()
    }

    /// Reference for the acquisition day, taken at 12:00:00
    pub fn lookup(&self, acquisition: &Acquisition) -> Option<f64> {
        let value = self.get(&acquisition.cams_key());
        if value.is_none() {
            log::info!(
                "No CAMS reference for {}, CAMS filter skipped",
                acquisition.date()
            );
        }
        value
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}
