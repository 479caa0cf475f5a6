#![allow(dead_code)]

use std::path::Path;
use tambaqui::PixelTable;

/// WATER | INLAND_WATER
pub const INLAND_WATER_MASK: f64 = 34.0;

pub type Pixel = Vec<(&'static str, f64)>;

/// A pixel that passes every stage with the default configuration
pub fn clean_pixel() -> Pixel {
    vec![
        ("Oa01_reflectance:float", 0.020),
        ("Oa02_reflectance:float", 0.025),
        ("Oa03_reflectance:float", 0.030),
        ("Oa04_reflectance:float", 0.040),
        ("Oa05_reflectance:float", 0.045),
        ("Oa06_reflectance:float", 0.060),
        ("Oa07_reflectance:float", 0.065),
        ("Oa08_reflectance:float", 0.060),
        ("Oa09_reflectance:float", 0.058),
        ("Oa10_reflectance:float", 0.057),
        ("Oa11_reflectance:float", 0.040),
        ("Oa12_reflectance:float", 0.020),
        ("Oa16_reflectance:float", 0.018),
        ("Oa17_reflectance:float", 0.015),
        ("Oa18_reflectance:float", 0.014),
        ("Oa21_reflectance:float", 0.005),
        ("OAA:float", 0.0),
        ("OZA:float", 30.0),
        ("SAA:float", 0.0),
        ("SZA:float", 30.0),
        ("T865:float", 0.10),
        ("A865:float", 1.5),
        ("WQSF_lsb:double", INLAND_WATER_MASK),
        ("latitude:double", -3.3),
        ("longitude:double", -60.5),
    ]
}

pub fn with(mut pixel: Pixel, column: &str, value: f64) -> Pixel {
    let entry = pixel
        .iter_mut()
        .find(|(c, _)| *c == column)
        .unwrap_or_else(|| panic!("fixture has no column {}", column));
    entry.1 = value;
    pixel
}

pub fn column_names() -> Vec<String> {
    clean_pixel().iter().map(|(c, _)| c.to_string()).collect()
}

pub fn table_of(rows: Vec<Pixel>) -> PixelTable {
    let values = rows
        .into_iter()
        .map(|row| row.into_iter().map(|(_, v)| v).collect())
        .collect();
    PixelTable::from_rows(column_names(), values).expect("valid fixture table")
}

/// Write rows as an extraction CSV
pub fn write_pixel_csv(path: &Path, rows: &[Pixel]) {
    let mut text = column_names().join(",");
    text.push('\n');
    for row in rows {
        let cells: Vec<String> = row.iter().map(|(_, v)| v.to_string()).collect();
        text.push_str(&cells.join(","));
        text.push('\n');
    }
    std::fs::write(path, text).expect("Failed to write fixture CSV");
}

/// Ten pixels, one per rejection rule plus two that survive
///
/// Row 0 and row 9 survive the default configuration.
pub fn ten_pixel_fixture() -> Vec<Pixel> {
    vec![
        clean_pixel(),
        with(clean_pixel(), "Oa01_reflectance:float", 1.0000184),
        with(clean_pixel(), "Oa17_reflectance:float", 0.25),
        with(clean_pixel(), "Oa17_reflectance:float", -0.01),
        // CLOUD
        with(clean_pixel(), "WQSF_lsb:double", INLAND_WATER_MASK + 8.0),
        with(clean_pixel(), "T865:float", 0.6),
        with(clean_pixel(), "Oa09_reflectance:float", 0.0),
        with(clean_pixel(), "Oa11_reflectance:float", 0.01),
        with(with(clean_pixel(), "OZA:float", 5.0), "SZA:float", 5.0),
        with(clean_pixel(), "Oa08_reflectance:float", 0.07),
    ]
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
