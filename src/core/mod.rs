//! Core water-reflectance processing modules

pub mod aggregate;
pub mod batch;
pub mod clustering;
pub mod kde;
pub mod pixel_filter;
pub mod quality_flags;
pub mod spm;
pub mod stats;

// Re-export main types
pub use aggregate::{AcquisitionSummary, QualityCode, TemporalAggregator, TimeSeries};
pub use batch::{BatchProcessor, BatchReport, ImageReport, ImageSource, ProcessingConfig};
pub use clustering::{dbscan, ClusterOutcome, ClusteringPreset, DbscanParams, OutlierClusterer, NOISE};
pub use kde::RedPeakFilter;
pub use pixel_filter::{FilterConfig, FilterOutcome, FilterStage, PixelFilterPipeline, StageReport};
pub use quality_flags::{QualityFlag, QualityFlags};
pub use spm::SpmModel;
pub use stats::Describe;
