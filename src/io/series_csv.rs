use crate::core::aggregate::TimeSeries;
use crate::core::stats::Describe;
use crate::io::pixel_csv::format_cell;
use crate::types::{Band, WqResult};
use std::path::Path;

const DESCRIBE_SUFFIXES: [&str; 6] = [".std", ".min", ".25%tile", ".50%tile", ".75%tile", ".max"];

/// Header of the series table, in column order
pub fn series_header() -> Vec<String> {
    let mut header: Vec<String> = ["filename", "Datetime", "Date-String"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(Band::ALL.iter().map(|b| b.label().to_string()));
    header.extend(
        ["IR-median", "OAA", "OZA", "SAA", "SZA"]
            .iter()
            .map(|s| s.to_string()),
    );
    for prefix in ["A865", "T865"] {
        header.push(format!("{}.count", prefix));
        header.push(prefix.to_string());
        header.extend(DESCRIBE_SUFFIXES.iter().map(|s| format!("{}{}", prefix, s)));
    }
    header.extend(
        [
            "meanGlint",
            "Glintstd",
            "abs-vld-px",
            "pct-vld-px",
            "quality",
            "quality-info",
            "SPM.avg",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    header
}

fn describe_cells(d: &Describe) -> [String; 8] {
    [
        d.count.to_string(),
        format_cell(d.mean),
        format_cell(d.std),
        format_cell(d.min),
        format_cell(d.p25),
        format_cell(d.p50),
        format_cell(d.p75),
        format_cell(d.max),
    ]
}

/// Write the chronological series table
pub fn write_series<P: AsRef<Path>>(path: P, series: &TimeSeries) -> WqResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(series_header())?;

    for row in series.iter() {
        let mut record = vec![
            row.filename.clone(),
            row.datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            row.date_string.clone(),
        ];
        record.extend(Band::ALL.iter().map(|&b| format_cell(row.band_mean(b))));
        record.extend([row.ir_median, row.oaa, row.oza, row.saa, row.sza].map(format_cell));
        record.extend(describe_cells(&row.a865));
        record.extend(describe_cells(&row.t865));
        record.push(format_cell(row.glint_mean));
        record.push(format_cell(row.glint_std));
        record.push(row.abs_valid_px.to_string());
        record.push(format_cell(row.pct_valid_px));
        record.push(row.quality.code().to_string());
        record.push(row.quality_info().to_string());
        record.push(row.spm_avg.map(format_cell).unwrap_or_default());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    log::info!("Saved series of {} acquisitions to {}", series.len(), path.display());
    Ok(())
}
