use crate::core::quality_flags::QualityFlags;
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};

/// Column names used by the extraction collaborator and the derived columns
/// appended by the filter pipeline.
pub mod columns {
    pub const OAA: &str = "OAA:float";
    pub const OZA: &str = "OZA:float";
    pub const SAA: &str = "SAA:float";
    pub const SZA: &str = "SZA:float";
    pub const T865: &str = "T865:float";
    pub const A865: &str = "A865:float";
    pub const WQSF: &str = "WQSF_lsb:double";
    pub const LATITUDE: &str = "latitude:double";
    pub const LONGITUDE: &str = "longitude:double";

    pub const ABSVLDPX: &str = "ABSVLDPX";
    pub const FLAGS: &str = "FLAGS";
    pub const QUALITY: &str = "QUALITY";
    pub const GLINT: &str = "GLINT";
    pub const MNDWI: &str = "MNDWI";
    pub const NDWI: &str = "NDWI";
    pub const SPM: &str = "SPM";
    pub const CLUSTER: &str = "cluster";

    /// Sun/view geometry angles, in degrees
    pub const GEOMETRY: [&str; 4] = [OAA, OZA, SAA, SZA];
}

/// Sentinel-3 OLCI bands delivered in the WFR product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    Oa01,
    Oa02,
    Oa03,
    Oa04,
    Oa05,
    Oa06,
    Oa07,
    Oa08,
    Oa09,
    Oa10,
    Oa11,
    Oa12,
    Oa16,
    Oa17,
    Oa18,
    Oa21,
}

/// Static description of one band
#[derive(Debug, Clone, Copy)]
pub struct BandInfo {
    pub band: Band,
    /// Column name in the extracted pixel tables
    pub column: &'static str,
    /// Band centre, nanometers
    pub wavelength_nm: f64,
    /// Column label in the series table
    pub label: &'static str,
}

/// Band lookup table, indexed by `Band as usize`
pub const BAND_TABLE: [BandInfo; 16] = [
    BandInfo { band: Band::Oa01, column: "Oa01_reflectance:float", wavelength_nm: 400.0, label: "B1-400" },
    BandInfo { band: Band::Oa02, column: "Oa02_reflectance:float", wavelength_nm: 412.5, label: "B2-412.5" },
    BandInfo { band: Band::Oa03, column: "Oa03_reflectance:float", wavelength_nm: 442.5, label: "B3-442.5" },
    BandInfo { band: Band::Oa04, column: "Oa04_reflectance:float", wavelength_nm: 490.0, label: "B4-490" },
    BandInfo { band: Band::Oa05, column: "Oa05_reflectance:float", wavelength_nm: 510.0, label: "B5-510" },
    BandInfo { band: Band::Oa06, column: "Oa06_reflectance:float", wavelength_nm: 560.0, label: "B6-560" },
    BandInfo { band: Band::Oa07, column: "Oa07_reflectance:float", wavelength_nm: 620.0, label: "B7-620" },
    BandInfo { band: Band::Oa08, column: "Oa08_reflectance:float", wavelength_nm: 665.0, label: "B8-665" },
    BandInfo { band: Band::Oa09, column: "Oa09_reflectance:float", wavelength_nm: 673.75, label: "B9-673.75" },
    BandInfo { band: Band::Oa10, column: "Oa10_reflectance:float", wavelength_nm: 681.25, label: "B10-681.25" },
    BandInfo { band: Band::Oa11, column: "Oa11_reflectance:float", wavelength_nm: 708.75, label: "B11-708.75" },
    BandInfo { band: Band::Oa12, column: "Oa12_reflectance:float", wavelength_nm: 753.75, label: "B12-753.75" },
    BandInfo { band: Band::Oa16, column: "Oa16_reflectance:float", wavelength_nm: 778.75, label: "B16-778.75" },
    BandInfo { band: Band::Oa17, column: "Oa17_reflectance:float", wavelength_nm: 865.0, label: "B17-865" },
    BandInfo { band: Band::Oa18, column: "Oa18_reflectance:float", wavelength_nm: 885.0, label: "B18-885" },
    BandInfo { band: Band::Oa21, column: "Oa21_reflectance:float", wavelength_nm: 1020.0, label: "B21-1020" },
];

impl Band {
    pub const ALL: [Band; 16] = [
        Band::Oa01,
        Band::Oa02,
        Band::Oa03,
        Band::Oa04,
        Band::Oa05,
        Band::Oa06,
        Band::Oa07,
        Band::Oa08,
        Band::Oa09,
        Band::Oa10,
        Band::Oa11,
        Band::Oa12,
        Band::Oa16,
        Band::Oa17,
        Band::Oa18,
        Band::Oa21,
    ];

    /// Red band used by the SPM model and the clustering features
    pub const RED: Band = Band::Oa08;
    /// Near-infrared band used by the thresholds and the SPM model
    pub const NIR: Band = Band::Oa17;
    /// Far-infrared reference band
    pub const FAR_IR: Band = Band::Oa21;

    pub fn info(self) -> &'static BandInfo {
        &BAND_TABLE[self as usize]
    }

    pub fn column(self) -> &'static str {
        self.info().column
    }

    pub fn wavelength_nm(self) -> f64 {
        self.info().wavelength_nm
    }

    pub fn label(self) -> &'static str {
        self.info().label
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {} nm", self, self.wavelength_nm())
    }
}

/// Every column the filter pipeline needs from the extraction
pub fn required_input_columns() -> Vec<&'static str> {
    let mut cols: Vec<&'static str> = Band::ALL.iter().map(|b| b.column()).collect();
    cols.extend_from_slice(&columns::GEOMETRY);
    cols.extend_from_slice(&[
        columns::T865,
        columns::A865,
        columns::WQSF,
        columns::LATITUDE,
        columns::LONGITUDE,
    ]);
    cols
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// True when the two boxes share at least one point (edges touching counts)
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// Per-pixel table for one acquisition (rows x named columns).
///
/// Rows only ever disappear; derived columns are appended. Every surviving row
/// remembers its position in the table as it was first built.
#[derive(Debug, Clone)]
pub struct PixelTable {
    columns: Vec<String>,
    values: Array2<f64>,
    flags: Option<Vec<Option<QualityFlags>>>,
    row_ids: Vec<usize>,
}

impl PixelTable {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> WqResult<Self> {
        if values.ncols() != columns.len() {
            return Err(WqError::Schema(format!(
                "{} column names given for {} value columns",
                columns.len(),
                values.ncols()
            )));
        }
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(WqError::Schema(format!("Duplicate column '{}'", name)));
            }
        }
        let row_ids = (0..values.nrows()).collect();
        Ok(Self {
            columns,
            values,
            flags: None,
            row_ids,
        })
    }

    /// Table with the given columns and no rows
    pub fn empty(columns: Vec<String>) -> WqResult<Self> {
        let width = columns.len();
        Self::new(columns, Array2::zeros((0, width)))
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<f64>>) -> WqResult<Self> {
        let width = columns.len();
        let height = rows.len();
        let mut flat = Vec::with_capacity(width * height);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(WqError::Schema(format!(
                    "Row {} has {} values, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
            flat.extend(row);
        }
        let values = Array2::from_shape_vec((height, width), flat)?;
        Self::new(columns, values)
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> WqResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| WqError::Schema(format!("Missing column '{}'", name)))
    }

    pub fn column(&self, name: &str) -> WqResult<ArrayView1<'_, f64>> {
        let idx = self.column_index(name)?;
        Ok(self.values.column(idx))
    }

    pub fn band(&self, band: Band) -> WqResult<ArrayView1<'_, f64>> {
        self.column(band.column())
    }

    pub fn value(&self, row: usize, name: &str) -> WqResult<f64> {
        let idx = self.column_index(name)?;
        self.values
            .get((row, idx))
            .copied()
            .ok_or_else(|| WqError::Processing(format!("Row {} out of range ({} rows)", row, self.len())))
    }

    /// Fails with every missing name listed at once
    pub fn require_columns(&self, names: &[&str]) -> WqResult<()> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !self.has_column(n))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(WqError::Schema(format!("Missing required columns: {}", missing.join(", "))))
        }
    }

    pub fn column_mut(&mut self, name: &str) -> WqResult<ArrayViewMut1<'_, f64>> {
        let idx = self.column_index(name)?;
        Ok(self.values.column_mut(idx))
    }

    /// Apply `f` to every value of one column
    pub fn map_column<F>(&mut self, name: &str, f: F) -> WqResult<()>
    where
        F: Fn(f64) -> f64,
    {
        let idx = self.column_index(name)?;
        self.values.column_mut(idx).mapv_inplace(f);
        Ok(())
    }

    /// Append a derived column, or overwrite it if it already exists
    pub fn push_column(&mut self, name: &str, data: Vec<f64>) -> WqResult<()> {
        if data.len() != self.len() {
            return Err(WqError::Processing(format!(
                "Column '{}' has {} values for {} rows",
                name,
                data.len(),
                self.len()
            )));
        }
        let data = Array1::from(data);
        if let Ok(idx) = self.column_index(name) {
            self.values.column_mut(idx).assign(&data);
            return Ok(());
        }
        self.values.push_column(data.view())?;
        self.columns.push(name.to_string());
        Ok(())
    }

    /// Keep the rows whose mask entry is true; returns how many were removed
    pub fn retain_rows(&mut self, keep: &[bool]) -> usize {
        debug_assert_eq!(keep.len(), self.len());
        let kept: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| if k { Some(i) } else { None })
            .collect();
        let removed = self.len() - kept.len();
        if removed == 0 {
            return 0;
        }

        self.values = self.values.select(Axis(0), &kept);
        let row_ids: Vec<usize> = kept.iter().map(|&i| self.row_ids[i]).collect();
        self.row_ids = row_ids;
        if let Some(flags) = self.flags.as_mut() {
            let kept_flags: Vec<Option<QualityFlags>> = kept.iter().map(|&i| flags[i]).collect();
            *flags = kept_flags;
        }
        removed
    }

    /// Decoded quality flags per row, once the pipeline has decoded them
    pub fn flags(&self) -> Option<&[Option<QualityFlags>]> {
        self.flags.as_deref()
    }

    pub fn set_flags(&mut self, flags: Vec<Option<QualityFlags>>) -> WqResult<()> {
        if flags.len() != self.len() {
            return Err(WqError::Processing(format!(
                "{} flag sets for {} rows",
                flags.len(),
                self.len()
            )));
        }
        self.flags = Some(flags);
        Ok(())
    }

    /// Position of each surviving row in the table as first built
    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    /// Renumber rows densely from zero, forgetting where they came from
    pub fn reset_index(&mut self) {
        self.row_ids = (0..self.len()).collect();
    }
}

/// Error types for water reflectance processing
#[derive(Debug, thiserror::Error)]
pub enum WqError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl WqError {
    /// Errors that only invalidate the current image, not the whole batch
    pub fn is_recoverable(&self) -> bool {
        match self {
            WqError::Schema(_) | WqError::InvalidFormat(_) => true,
            WqError::Csv(e) => !matches!(e.kind(), csv::ErrorKind::Io(_)),
            _ => false,
        }
    }
}

/// Result type for water reflectance operations
pub type WqResult<T> = Result<T, WqError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn small_table() -> PixelTable {
        PixelTable::from_rows(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_band_table_is_indexed_by_discriminant() {
        for band in Band::ALL {
            assert_eq!(band.info().band, band);
        }
        assert_eq!(Band::RED.column(), "Oa08_reflectance:float");
        assert_eq!(Band::NIR.label(), "B17-865");
        assert_eq!(Band::FAR_IR.wavelength_nm(), 1020.0);
    }

    #[test]
    fn test_retain_rows_tracks_identity() {
        let mut table = small_table();
        let removed = table.retain_rows(&[true, false, true]);
        assert_eq!(removed, 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.row_ids(), &[0, 2]);
        assert_eq!(table.value(1, "b").unwrap(), 30.0);

        table.reset_index();
        assert_eq!(table.row_ids(), &[0, 1]);
    }

    #[test]
    fn test_push_column_appends_then_overwrites() {
        let mut table = small_table();
        table.push_column("c", vec![0.1, 0.2, 0.3]).unwrap();
        assert_eq!(table.columns().len(), 3);
        assert_eq!(table.value(2, "c").unwrap(), 0.3);

        table.push_column("c", vec![5.0, 5.0, 5.0]).unwrap();
        assert_eq!(table.columns().len(), 3);
        assert_eq!(table.value(0, "c").unwrap(), 5.0);

        assert!(table.push_column("d", vec![1.0]).is_err());
    }

    #[test]
    fn test_push_column_on_empty_table() {
        let mut table = PixelTable::empty(vec!["a".to_string()]).unwrap();
        table.push_column("b", Vec::new()).unwrap();
        assert!(table.is_empty());
        assert!(table.has_column("b"));
    }

    #[test]
    fn test_require_columns_lists_all_missing() {
        let table = small_table();
        let err = table.require_columns(&["a", "x", "y"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("x") && msg.contains("y"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let result = PixelTable::from_rows(
            vec!["a".to_string(), "a".to_string()],
            vec![vec![1.0, 2.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bounding_box_touching_edges_intersect() {
        let a = BoundingBox { min_lon: -60.0, max_lon: -59.0, min_lat: -3.5, max_lat: -3.0 };
        let b = BoundingBox { min_lon: -59.0, max_lon: -58.0, min_lat: -3.2, max_lat: -2.0 };
        let c = BoundingBox { min_lon: -50.0, max_lon: -49.0, min_lat: -3.2, max_lat: -2.0 };
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert!(a.contains(-59.5, -3.1));
    }
}
