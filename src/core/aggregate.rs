//! Per-acquisition summaries and the chronological series built from them.

use crate::core::spm::SpmModel;
use crate::core::stats::{nan_mean, nan_median, nan_std, Describe};
use crate::io::acquisition::Acquisition;
use crate::types::{columns, Band, PixelTable, WqResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Below this share of surviving pixels an image is flagged
pub const MIN_VALID_PERCENTAGE: f64 = 5.0;

/// Completeness class of one acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityCode {
    Empty = 0,
    Pass = 1,
    LowValidity = 2,
}

impl QualityCode {
    pub fn classify(absolute_valid_pixels: usize, valid_percentage: f64) -> Self {
        if absolute_valid_pixels == 0 {
            QualityCode::Empty
        } else if valid_percentage < MIN_VALID_PERCENTAGE {
            QualityCode::LowValidity
        } else {
            QualityCode::Pass
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn description(self) -> &'static str {
        match self {
            QualityCode::Empty => "Empty table, processing skipped.",
            QualityCode::Pass => "Pass.",
            QualityCode::LowValidity => "Less than 5% of valid pixels.",
        }
    }
}

/// One row of the time series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionSummary {
    pub filename: String,
    pub datetime: NaiveDateTime,
    pub date_string: String,
    pub band_means: BTreeMap<Band, f64>,
    /// Median NIR reflectance
    pub ir_median: f64,
    pub oaa: f64,
    pub oza: f64,
    pub saa: f64,
    pub sza: f64,
    pub a865: Describe,
    pub t865: Describe,
    pub glint_mean: f64,
    pub glint_std: f64,
    pub abs_valid_px: usize,
    pub pct_valid_px: f64,
    pub quality: QualityCode,
    /// SPM of the mean RED and NIR, set once the series is assembled; `None` for empty images
    pub spm_avg: Option<f64>,
}

impl AcquisitionSummary {
    /// Reduce one filtered table.
    ///
    /// `absolute_valid_pixels` is the row count before filtering. A table
    /// with no rows left yields zero-valued statistics.
    pub fn summarize(
        acquisition: &Acquisition,
        table: &PixelTable,
        absolute_valid_pixels: usize,
    ) -> WqResult<Self> {
        let pct_valid_px = if absolute_valid_pixels == 0 {
            0.0
        } else {
            table.len() as f64 * 100.0 / absolute_valid_pixels as f64
        };
        let quality = QualityCode::classify(absolute_valid_pixels, pct_valid_px);

        let mut summary = Self {
            filename: acquisition.filename.clone(),
            datetime: acquisition.datetime,
            date_string: acquisition.date_string(),
            band_means: Band::ALL.iter().map(|&b| (b, 0.0)).collect(),
            ir_median: 0.0,
            oaa: 0.0,
            oza: 0.0,
            saa: 0.0,
            sza: 0.0,
            a865: Describe::zeroed(),
            t865: Describe::zeroed(),
            glint_mean: 0.0,
            glint_std: 0.0,
            abs_valid_px: absolute_valid_pixels,
            pct_valid_px,
            quality,
            spm_avg: None,
        };
        if table.is_empty() {
            return Ok(summary);
        }

        for band in Band::ALL {
            summary.band_means.insert(band, nan_mean(table.band(band)?));
        }
        summary.ir_median = nan_median(table.band(Band::NIR)?);
        summary.oaa = nan_mean(table.column(columns::OAA)?);
        summary.oza = nan_mean(table.column(columns::OZA)?);
        summary.saa = nan_mean(table.column(columns::SAA)?);
        summary.sza = nan_mean(table.column(columns::SZA)?);
        summary.a865 = Describe::of(table.column(columns::A865)?);
        summary.t865 = Describe::of(table.column(columns::T865)?);
        let glint = table.column(columns::GLINT)?;
        summary.glint_mean = nan_mean(glint);
        summary.glint_std = nan_std(glint);
        Ok(summary)
    }

    pub fn band_mean(&self, band: Band) -> f64 {
        self.band_means.get(&band).copied().unwrap_or(f64::NAN)
    }

    pub fn quality_info(&self) -> &'static str {
        self.quality.description()
    }
}

/// Collects acquisition summaries into a chronological series
#[derive(Debug, Default)]
pub struct TemporalAggregator {
    rows: Vec<AcquisitionSummary>,
}

impl TemporalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, summary: AcquisitionSummary) {
        self.rows.push(summary);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Order rows by acquisition time and attach the series-level SPM
    pub fn finish(mut self, spm: &SpmModel) -> TimeSeries {
        self.rows.sort_by(|a, b| a.datetime.cmp(&b.datetime));
        for row in self.rows.iter_mut() {
            row.spm_avg = match row.quality {
                QualityCode::Empty => None,
                _ => Some(spm.estimate(row.band_mean(Band::RED), row.band_mean(Band::NIR))),
            };
        }
        TimeSeries { rows: self.rows }
    }
}

impl Extend<AcquisitionSummary> for TemporalAggregator {
    fn extend<I: IntoIterator<Item = AcquisitionSummary>>(&mut self, iter: I) {
        self.rows.extend(iter);
    }
}

/// Chronologically ordered acquisition summaries
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimeSeries {
    rows: Vec<AcquisitionSummary>,
}

impl TimeSeries {
    pub fn rows(&self) -> &[AcquisitionSummary] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AcquisitionSummary> {
        self.rows.iter()
    }

    /// Rows with the given quality code
    pub fn with_quality(&self, quality: QualityCode) -> impl Iterator<Item = &AcquisitionSummary> {
        self.rows.iter().filter(move |r| r.quality == quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_classification() {
        assert_eq!(QualityCode::classify(0, 0.0), QualityCode::Empty);
        assert_eq!(QualityCode::classify(100, 3.0), QualityCode::LowValidity);
        assert_eq!(QualityCode::classify(100, 10.0), QualityCode::Pass);
        assert_eq!(QualityCode::classify(100, 5.0), QualityCode::Pass);
        assert_eq!(QualityCode::LowValidity.code(), 2);
        assert_eq!(QualityCode::Empty.description(), "Empty table, processing skipped.");
    }

    #[test]
    fn test_empty_table_gives_zero_statistics() {
        let acq = Acquisition::from_filename("S3A_OL_2_WFR____20200105T133000_x.csv").unwrap();
        let table = PixelTable::empty(vec!["a".to_string()]).unwrap();

        let summary = AcquisitionSummary::summarize(&acq, &table, 0).unwrap();
        assert_eq!(summary.quality, QualityCode::Empty);
        assert_eq!(summary.band_mean(Band::Oa01), 0.0);
        assert_eq!(summary.t865, Describe::zeroed());
        assert_eq!(summary.date_string, "20200105T133000");

        let summary = AcquisitionSummary::summarize(&acq, &table, 40).unwrap();
        assert_eq!(summary.quality, QualityCode::LowValidity);
        assert_eq!(summary.pct_valid_px, 0.0);
        assert_eq!(summary.abs_valid_px, 40);
    }
}
