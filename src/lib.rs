//! tambaqui: Sentinel-3 OLCI water reflectance time series.
//!
//! This library turns per-pixel WFR extractions, one table per acquisition,
//! into a filtered, outlier-free and chronologically ordered series of
//! water-quality statistics, with suspended particulate matter estimates.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{columns, Band, BoundingBox, PixelTable, WqError, WqResult};

pub use io::{Acquisition, CamsTable, FootprintTest, PixelCsv};

pub use crate::core::{
    BatchProcessor, ClusteringPreset, OutlierClusterer, PixelFilterPipeline, ProcessingConfig,
    SpmModel, TemporalAggregator,
};
