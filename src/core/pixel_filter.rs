//! Per-image pixel filtering.
//!
//! The stages run in a fixed order and each one only removes rows or appends
//! derived columns. Reordering them changes the result.

use crate::core::quality_flags::{self, QualityFlags};
use crate::core::spm::SpmModel;
use crate::types::{columns, required_input_columns, Band, PixelTable, WqError, WqResult};
use serde::{Deserialize, Serialize};

/// Oa01 value written by the processor for saturated pixels
pub const SATURATION_SENTINEL: f64 = 1.0000184;

/// Bands where non-positive reflectance is treated as missing
pub const SCRUBBED_BANDS: [Band; 6] = [Band::Oa06, Band::Oa07, Band::Oa08, Band::Oa09, Band::Oa10, Band::Oa17];

/// MNDWI and NDWI must lie strictly inside (-limit, limit)
pub const WATER_INDEX_LIMIT: f64 = 0.99;

/// Filter pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Drop pixels with NIR (Oa17) below this value
    pub nir_min: Option<f64>,
    /// Drop pixels with NIR (Oa17) above this value
    pub nir_max: Option<f64>,
    /// Drop pixels with T865 at or above this value
    pub max_aot: Option<f64>,
    /// Drop pixels with a glint angle at or below this value (degrees)
    pub glint_threshold: f64,
    /// Subtract Oa21 from `normalize_bands` before thresholding
    pub normalize: bool,
    pub normalize_bands: Vec<Band>,
    pub spm: SpmModel,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            nir_min: Some(0.0),
            nir_max: Some(0.2),
            max_aot: Some(0.6),
            glint_threshold: 20.0,
            normalize: false,
            normalize_bands: Band::ALL
                .iter()
                .copied()
                .filter(|b| *b != Band::FAR_IR)
                .collect(),
            spm: SpmModel::default(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> WqResult<()> {
        if let (Some(min), Some(max)) = (self.nir_min, self.nir_max) {
            if min > max {
                return Err(WqError::Config(format!(
                    "NIR minimum {} is above NIR maximum {}",
                    min, max
                )));
            }
        }
        if let Some(aot) = self.max_aot {
            if !(aot > 0.0) {
                return Err(WqError::Config(format!("Maximum AOT must be positive, got {}", aot)));
            }
        }
        if !self.glint_threshold.is_finite() {
            return Err(WqError::Config("Glint threshold must be finite".to_string()));
        }
        Ok(())
    }
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    Input,
    Saturation,
    Normalization,
    NirMin,
    NirMax,
    CamsProxy,
    QualityFlags,
    MaxAot,
    MissingReflectance,
    SpectralShape,
    Glint,
    WaterIndices,
    Reindex,
    Spm,
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FilterStage::Input => "input",
            FilterStage::Saturation => "saturation",
            FilterStage::Normalization => "normalization",
            FilterStage::NirMin => "nir-min",
            FilterStage::NirMax => "nir-max",
            FilterStage::CamsProxy => "cams-proxy",
            FilterStage::QualityFlags => "quality-flags",
            FilterStage::MaxAot => "max-aot",
            FilterStage::MissingReflectance => "missing-reflectance",
            FilterStage::SpectralShape => "spectral-shape",
            FilterStage::Glint => "glint",
            FilterStage::WaterIndices => "water-indices",
            FilterStage::Reindex => "reindex",
            FilterStage::Spm => "spm",
        };
        f.write_str(name)
    }
}

/// Row count after one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: FilterStage,
    pub rows: usize,
}

/// Result of filtering one image
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub table: PixelTable,
    /// Row count before any filtering (ABSVLDPX)
    pub absolute_valid_pixels: usize,
    /// Input row of every surviving pixel
    pub source_rows: Vec<usize>,
    pub stages: Vec<StageReport>,
}

impl FilterOutcome {
    pub fn valid_percentage(&self) -> f64 {
        if self.absolute_valid_pixels == 0 {
            return 0.0;
        }
        self.table.len() as f64 * 100.0 / self.absolute_valid_pixels as f64
    }
}

/// Sun glint angle in degrees from view/sun geometry given in degrees
pub fn glint_angle(oza: f64, sza: f64, saa: f64, oaa: f64) -> f64 {
    let oza = oza.to_radians();
    let sza = sza.to_radians();
    let relative_azimuth = (saa - oaa).abs().to_radians();
    (oza.cos() * sza.cos() - oza.sin() * sza.sin() * relative_azimuth.cos())
        .acos()
        .to_degrees()
}

/// Normalized difference `(a - b) / (a + b)`
pub fn normalized_difference(a: f64, b: f64) -> f64 {
    (a - b) / (a + b)
}

/// Ordered pixel filter for one acquisition
pub struct PixelFilterPipeline {
    config: FilterConfig,
}

impl PixelFilterPipeline {
    pub fn new() -> Self {
        Self {
            config: FilterConfig::default(),
        }
    }

    pub fn with_config(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Filter one image's pixel table.
    ///
    /// `cams_aot` is the CAMS AOD865 reference for the acquisition day, if any.
    /// An empty result is a valid outcome; only a malformed input is an error.
    pub fn run(&self, mut table: PixelTable, cams_aot: Option<f64>) -> WqResult<FilterOutcome> {
        let required = required_input_columns();
        table.require_columns(&required)?;

        let absolute_valid_pixels = table.len();
        let mut stages = vec![StageReport {
            stage: FilterStage::Input,
            rows: absolute_valid_pixels,
        }];
        table.push_column(
            columns::ABSVLDPX,
            vec![absolute_valid_pixels as f64; absolute_valid_pixels],
        )?;

        let keep = keep_where(&table, Band::Oa01.column(), |v| v != SATURATION_SENTINEL)?;
        retain(&mut table, &keep, FilterStage::Saturation, &mut stages);

        if self.config.normalize {
            let reference = table.band(Band::FAR_IR)?.to_owned();
            for band in &self.config.normalize_bands {
                let mut column = table.column_mut(band.column())?;
                column -= &reference;
            }
        }
        record(&table, FilterStage::Normalization, &mut stages);

        // NaN thresholds never compare true, so a missing NIR survives here
        // and is swept with the other missing values further down
        if let Some(min) = self.config.nir_min {
            let keep = keep_where(&table, Band::NIR.column(), |v| v >= min || v.is_nan())?;
            retain(&mut table, &keep, FilterStage::NirMin, &mut stages);
        } else {
            record(&table, FilterStage::NirMin, &mut stages);
        }
        if let Some(max) = self.config.nir_max {
            let keep = keep_where(&table, Band::NIR.column(), |v| v <= max || v.is_nan())?;
            retain(&mut table, &keep, FilterStage::NirMax, &mut stages);
        } else {
            record(&table, FilterStage::NirMax, &mut stages);
        }

        match cams_aot {
            Some(reference) => {
                let keep = keep_where(&table, columns::T865, |v| v > reference)?;
                retain(&mut table, &keep, FilterStage::CamsProxy, &mut stages);
            }
            None => record(&table, FilterStage::CamsProxy, &mut stages),
        }

        let decoded: Vec<Option<QualityFlags>> = table
            .column(columns::WQSF)?
            .iter()
            .map(|&v| quality_flags::decode_f64(v))
            .collect::<WqResult<_>>()?;
        let quality: Vec<u8> = decoded.iter().map(|f| quality_flags::quality(*f)).collect();
        let keep: Vec<bool> = decoded
            .iter()
            .zip(&quality)
            .map(|(f, &q)| f.is_some() && q == 1)
            .collect();
        table.push_column(columns::QUALITY, quality.iter().map(|&q| f64::from(q)).collect())?;
        table.set_flags(decoded)?;
        retain(&mut table, &keep, FilterStage::QualityFlags, &mut stages);

        if let Some(max_aot) = self.config.max_aot {
            let keep = keep_where(&table, columns::T865, |v| v < max_aot || v.is_nan())?;
            retain(&mut table, &keep, FilterStage::MaxAot, &mut stages);
        } else {
            record(&table, FilterStage::MaxAot, &mut stages);
        }

        for band in SCRUBBED_BANDS {
            table.map_column(band.column(), |v| if v <= 0.0 { f64::NAN } else { v })?;
        }
        let indices: Vec<usize> = required
            .iter()
            .map(|c| table.column_index(c))
            .collect::<WqResult<_>>()?;
        let keep: Vec<bool> = table
            .values()
            .rows()
            .into_iter()
            .map(|row| indices.iter().all(|&i| !row[i].is_nan()))
            .collect();
        retain(&mut table, &keep, FilterStage::MissingReflectance, &mut stages);

        // Oa12 sits in an atmospheric absorption window and must stay below Oa11
        let keep: Vec<bool> = {
            let oa11 = table.band(Band::Oa11)?;
            let oa12 = table.band(Band::Oa12)?;
            oa11.iter().zip(oa12.iter()).map(|(a, b)| a > b).collect()
        };
        retain(&mut table, &keep, FilterStage::SpectralShape, &mut stages);

        let glint: Vec<f64> = {
            let oza = table.column(columns::OZA)?;
            let sza = table.column(columns::SZA)?;
            let saa = table.column(columns::SAA)?;
            let oaa = table.column(columns::OAA)?;
            (0..oza.len())
                .map(|i| glint_angle(oza[i], sza[i], saa[i], oaa[i]))
                .collect()
        };
        let threshold = self.config.glint_threshold;
        let keep: Vec<bool> = glint.iter().map(|&g| g > threshold || g.is_nan()).collect();
        table.push_column(columns::GLINT, glint)?;
        retain(&mut table, &keep, FilterStage::Glint, &mut stages);

        let (mndwi, ndwi): (Vec<f64>, Vec<f64>) = {
            let green = table.band(Band::Oa06)?;
            let swir = table.band(Band::Oa21)?;
            let nir = table.band(Band::NIR)?;
            (0..green.len())
                .map(|i| {
                    (
                        normalized_difference(green[i], swir[i]),
                        normalized_difference(green[i], nir[i]),
                    )
                })
                .unzip()
        };
        let inside = |v: f64| v > -WATER_INDEX_LIMIT && v < WATER_INDEX_LIMIT;
        let keep: Vec<bool> = mndwi
            .iter()
            .zip(&ndwi)
            .map(|(&m, &n)| inside(m) && inside(n))
            .collect();
        table.push_column(columns::MNDWI, mndwi)?;
        table.push_column(columns::NDWI, ndwi)?;
        retain(&mut table, &keep, FilterStage::WaterIndices, &mut stages);

        let source_rows = table.row_ids().to_vec();
        table.reset_index();
        record(&table, FilterStage::Reindex, &mut stages);

        let spm = {
            let red = table.band(Band::RED)?;
            let nir = table.band(Band::NIR)?;
            self.config.spm.estimate_many(red.iter(), nir.iter())
        };
        table.push_column(columns::SPM, spm)?;
        record(&table, FilterStage::Spm, &mut stages);

        log::info!(
            "Pixel filtering kept {} of {} pixels",
            table.len(),
            absolute_valid_pixels
        );

        Ok(FilterOutcome {
            table,
            absolute_valid_pixels,
            source_rows,
            stages,
        })
    }
}

impl Default for PixelFilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn keep_where<F>(table: &PixelTable, column: &str, predicate: F) -> WqResult<Vec<bool>>
where
    F: Fn(f64) -> bool,
{
    Ok(table.column(column)?.iter().map(|&v| predicate(v)).collect())
}

fn retain(table: &mut PixelTable, keep: &[bool], stage: FilterStage, stages: &mut Vec<StageReport>) {
    let removed = table.retain_rows(keep);
    if removed > 0 {
        log::debug!("Stage {}: dropped {} rows, {} left", stage, removed, table.len());
    }
    record(table, stage, stages);
}

fn record(table: &PixelTable, stage: FilterStage, stages: &mut Vec<StageReport>) {
    stages.push(StageReport {
        stage,
        rows: table.len(),
    });
}
