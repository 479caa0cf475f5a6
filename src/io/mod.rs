//! Input/output modules for pixel tables, CAMS references and series tables

pub mod acquisition;
pub mod cams;
pub mod footprint;
pub mod pixel_csv;
pub mod series_csv;

pub use acquisition::Acquisition;
pub use cams::CamsTable;
pub use footprint::{footprint_of, FootprintTest};
pub use pixel_csv::PixelCsv;
pub use series_csv::{series_header, write_series};
