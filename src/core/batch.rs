//! Batch orchestration: one pixel table per acquisition in, one series out.
//!
//! Images are filtered independently on a bounded pool, then summarized in
//! chronological order. Errors confined to one image skip that image; I/O
//! failures stop the batch.

use crate::core::aggregate::{AcquisitionSummary, TemporalAggregator, TimeSeries};
use crate::core::clustering::{ClusterOutcome, ClusteringPreset, OutlierClusterer};
use crate::core::kde::RedPeakFilter;
use crate::core::pixel_filter::{FilterConfig, PixelFilterPipeline, StageReport};
use crate::io::{footprint_of, write_series, Acquisition, CamsTable, FootprintTest, PixelCsv};
use crate::types::{BoundingBox, PixelTable, WqError, WqResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory, under the output root, receiving the filtered tables
pub const FILTERED_DIR: &str = "CSV_N2";

/// Everything a batch run can be configured with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub filter: FilterConfig,
    /// DBSCAN preset; None disables clustering
    pub clustering: Option<ClusteringPreset>,
    /// Apply the CAMS proxy filter when a reference exists
    pub use_cams: bool,
    /// Apply the RED density peak filter
    pub kde: bool,
    /// Region name used for the series file
    pub roi_name: String,
    /// Worker threads; None uses all cores but one
    pub threads: Option<usize>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            clustering: Some(ClusteringPreset::M4),
            use_cams: false,
            kde: false,
            roi_name: "roi".to_string(),
            threads: None,
        }
    }
}

impl ProcessingConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> WqResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::debug!("Loaded processing configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> WqResult<()> {
        self.filter.validate()?;
        if self.threads == Some(0) {
            return Err(WqError::Config("Thread count must be at least 1".to_string()));
        }
        if self.roi_name.trim().is_empty() {
            return Err(WqError::Config("Region name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.threads.unwrap_or_else(default_threads)
    }
}

/// All available cores but one, at least one
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

/// One extracted pixel table and, if known, the footprint of its image
#[derive(Debug, Clone)]
pub struct ImageSource {
    pub path: PathBuf,
    pub footprint: Option<BoundingBox>,
}

impl ImageSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            footprint: None,
        }
    }

    pub fn with_footprint(mut self, footprint: BoundingBox) -> Self {
        self.footprint = Some(footprint);
        self
    }
}

/// What happened to one image
#[derive(Debug, Clone)]
pub struct ImageReport {
    pub acquisition: Acquisition,
    pub summary: AcquisitionSummary,
    pub stages: Vec<StageReport>,
    /// False when the image footprint misses the region
    pub touches_roi: bool,
    /// Some(true) when clustering fell back to the unclustered table
    pub clustering_reverted: Option<bool>,
    pub filtered_path: Option<PathBuf>,
}

/// An image left out of the series, and why
#[derive(Debug, Clone)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a batch run
#[derive(Debug)]
pub struct BatchReport {
    pub series: TimeSeries,
    pub images: Vec<ImageReport>,
    pub skipped: Vec<SkippedImage>,
    pub series_path: PathBuf,
}

pub struct BatchProcessor {
    config: ProcessingConfig,
    pipeline: PixelFilterPipeline,
    roi: Option<Box<dyn FootprintTest>>,
    cams: Option<CamsTable>,
}

impl BatchProcessor {
    pub fn new(config: ProcessingConfig) -> WqResult<Self> {
        config.validate()?;
        Ok(Self {
            pipeline: PixelFilterPipeline::with_config(config.filter.clone()),
            config,
            roi: None,
            cams: None,
        })
    }

    pub fn with_roi<R: FootprintTest + 'static>(mut self, roi: R) -> Self {
        self.roi = Some(Box::new(roi));
        self
    }

    pub fn with_cams(mut self, cams: CamsTable) -> Self {
        self.cams = Some(cams);
        self
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Process every image and write the filtered tables and the series
    pub fn run(&self, sources: &[ImageSource], output_dir: &Path) -> WqResult<BatchReport> {
        if self.config.use_cams && self.cams.is_none() {
            return Err(WqError::Config(
                "CAMS filtering is enabled but no CAMS table was given".to_string(),
            ));
        }

        let mut skipped = Vec::new();
        let mut queue: Vec<(Acquisition, &ImageSource)> = Vec::with_capacity(sources.len());
        for source in sources {
            match Acquisition::from_path(&source.path) {
                Ok(acq) => queue.push((acq, source)),
                Err(e) => {
                    log::warn!("Skipping {}: {}", source.path.display(), e);
                    skipped.push(SkippedImage {
                        path: source.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        queue.sort_by(|a, b| a.0.cmp(&b.0));

        let filtered_dir = output_dir.join(FILTERED_DIR);
        std::fs::create_dir_all(&filtered_dir)?;

        log::info!(
            "Processing {} images on {} threads",
            queue.len(),
            self.config.worker_threads()
        );
        let start_time = std::time::Instant::now();
        let results = self.process_all(&queue, &filtered_dir)?;

        let mut aggregator = TemporalAggregator::new();
        let mut images = Vec::with_capacity(results.len());
        for ((_, source), result) in queue.iter().zip(results) {
            match result {
                Ok(report) => {
                    aggregator.push(report.summary.clone());
                    images.push(report);
                }
                Err(e) if e.is_recoverable() => {
                    log::warn!("Skipping {}: {}", source.path.display(), e);
                    skipped.push(SkippedImage {
                        path: source.path.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let series = aggregator.finish(&self.config.filter.spm);
        let series_path = output_dir.join(format!("{}_series.csv", self.config.roi_name));
        write_series(&series_path, &series)?;

        log::info!(
            "Batch done in {:?}: {} images in series, {} skipped",
            start_time.elapsed(),
            series.len(),
            skipped.len()
        );

        Ok(BatchReport {
            series,
            images,
            skipped,
            series_path,
        })
    }

    #[cfg(feature = "parallel")]
    fn process_all(
        &self,
        queue: &[(Acquisition, &ImageSource)],
        filtered_dir: &Path,
    ) -> WqResult<Vec<WqResult<ImageReport>>> {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads())
            .build()
            .map_err(|e| WqError::Processing(format!("Failed to build thread pool: {}", e)))?;
        Ok(pool.install(|| {
            queue
                .par_iter()
                .map(|(acq, source)| self.process_image(acq, source, filtered_dir))
                .collect()
        }))
    }

    #[cfg(not(feature = "parallel"))]
    fn process_all(
        &self,
        queue: &[(Acquisition, &ImageSource)],
        filtered_dir: &Path,
    ) -> WqResult<Vec<WqResult<ImageReport>>> {
        Ok(queue
            .iter()
            .map(|(acq, source)| self.process_image(acq, source, filtered_dir))
            .collect())
    }

    /// Filter, cluster, save and summarize one image
    pub fn process_image(
        &self,
        acquisition: &Acquisition,
        source: &ImageSource,
        filtered_dir: &Path,
    ) -> WqResult<ImageReport> {
        if let (Some(roi), Some(footprint)) = (&self.roi, &source.footprint) {
            if !roi.touches(footprint) {
                return self.outside_roi(acquisition);
            }
        }

        let table = PixelCsv::read(&source.path)?;
        if let (Some(roi), None) = (&self.roi, &source.footprint) {
            if let Some(footprint) = footprint_of(&table)? {
                if !roi.touches(&footprint) {
                    return self.outside_roi(acquisition);
                }
            }
        }

        let cams_aot = if self.config.use_cams {
            self.cams.as_ref().and_then(|c| c.lookup(acquisition))
        } else {
            None
        };

        let outcome = self.pipeline.run(table, cams_aot)?;
        let absolute_valid_pixels = outcome.absolute_valid_pixels;
        let stages = outcome.stages;
        let mut table = outcome.table;

        if self.config.kde && !table.is_empty() {
            RedPeakFilter::new().apply(&mut table)?;
        }

        let mut clustering_reverted = None;
        if let Some(preset) = self.config.clustering {
            if !table.is_empty() {
                let clustered = OutlierClusterer::new(preset).apply(table)?;
                clustering_reverted = Some(clustered.is_reverted());
                if let ClusterOutcome::Clustered { selected, .. } = &clustered {
                    log::debug!("{}: kept cluster {}", acquisition.date_string(), selected);
                }
                table = clustered.into_table();
            }
        }

        let filtered_path = filtered_dir.join(format!("{}.csv", acquisition.stem()));
        PixelCsv::write(&filtered_path, &table)?;

        let summary = AcquisitionSummary::summarize(acquisition, &table, absolute_valid_pixels)?;
        log::info!(
            "{}: {} of {} pixels valid, quality {}",
            acquisition.date_string(),
            table.len(),
            absolute_valid_pixels,
            summary.quality.code()
        );

        Ok(ImageReport {
            acquisition: acquisition.clone(),
            summary,
            stages,
            touches_roi: true,
            clustering_reverted,
            filtered_path: Some(filtered_path),
        })
    }

    fn outside_roi(&self, acquisition: &Acquisition) -> WqResult<ImageReport> {
        log::info!(
            "{}: footprint misses the region, reported as empty",
            acquisition.date_string()
        );
        let empty = PixelTable::empty(Vec::new())?;
        Ok(ImageReport {
            acquisition: acquisition.clone(),
            summary: AcquisitionSummary::summarize(acquisition, &empty, 0)?,
            stages: Vec::new(),
            touches_roi: false,
            clustering_reverted: None,
            filtered_path: None,
        })
    }
}
