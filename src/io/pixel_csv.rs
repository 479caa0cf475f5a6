use crate::types::{columns, required_input_columns, PixelTable, WqError, WqResult};
use std::path::Path;

/// Reader and writer for per-image pixel tables in delimited text
pub struct PixelCsv;

impl PixelCsv {
    /// Read an extracted pixel table.
    ///
    /// Empty cells are missing values. Columns holding text are dropped,
    /// unless the filter pipeline needs them, in which case the file is
    /// rejected.
    pub fn read<P: AsRef<Path>>(path: P) -> WqResult<PixelTable> {
        let path = path.as_ref();
        log::debug!("Reading pixel table: {}", path.display());
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

        let mut raw: Vec<Vec<Option<f64>>> = Vec::new();
        let mut numeric = vec![true; headers.len()];
        for result in reader.records() {
            let record = result?;
            let mut row = Vec::with_capacity(headers.len());
            for (idx, cell) in record.iter().enumerate().take(headers.len()) {
                if cell.is_empty() {
                    row.push(Some(f64::NAN));
                    continue;
                }
                match parse_cell(cell) {
                    Some(v) => row.push(Some(v)),
                    None => {
                        numeric[idx] = false;
                        row.push(None);
                    }
                }
            }
            row.resize(headers.len(), Some(f64::NAN));
            raw.push(row);
        }

        let required = required_input_columns();
        let mut keep = Vec::new();
        for (idx, name) in headers.iter().enumerate() {
            if numeric[idx] {
                keep.push(idx);
            } else if required.contains(&name.as_str()) {
                return Err(WqError::InvalidFormat(format!(
                    "Column '{}' in {} holds non-numeric values",
                    name,
                    path.display()
                )));
            } else {
                log::debug!("Dropping text column '{}'", name);
            }
        }

        let names: Vec<String> = keep.iter().map(|&i| headers[i].clone()).collect();
        let rows: Vec<Vec<f64>> = raw
            .into_iter()
            .map(|row| keep.iter().map(|&i| row[i].unwrap_or(f64::NAN)).collect())
            .collect();
        PixelTable::from_rows(names, rows)
    }

    /// Write a table, decoded flags rendered as `|`-joined names
    pub fn write<P: AsRef<Path>>(path: P, table: &PixelTable) -> WqResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;

        let mut header: Vec<&str> = table.columns().iter().map(|c| c.as_str()).collect();
        let flags = table.flags();
        if flags.is_some() {
            header.push(columns::FLAGS);
        }
        writer.write_record(&header)?;

        for (i, row) in table.values().rows().into_iter().enumerate() {
            let mut record: Vec<String> = row.iter().map(|&v| format_cell(v)).collect();
            if let Some(flags) = flags {
                record.push(match flags[i] {
                    Some(set) => set.to_string(),
                    None => "False".to_string(),
                });
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        log::info!("Saved {} pixels to {}", table.len(), path.display());
        Ok(())
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    match cell {
        "NaN" | "nan" => Some(f64::NAN),
        _ => cell.parse::<f64>().ok(),
    }
}

pub(crate) fn format_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_columns_dropped_and_blanks_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixels.csv");
        std::fs::write(&path, "a,label,b\n1.5,x,\n2.5,y,4\n").unwrap();

        let table = PixelCsv::read(&path).unwrap();
        assert_eq!(table.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.value(0, "a").unwrap(), 1.5);
        assert!(table.value(0, "b").unwrap().is_nan());
        assert_eq!(table.value(1, "b").unwrap(), 4.0);
    }

    #[test]
    fn test_text_in_required_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixels.csv");
        std::fs::write(&path, "T865:float\nhigh\n").unwrap();
        let err = PixelCsv::read(&path).unwrap_err();
        assert!(matches!(err, WqError::InvalidFormat(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_write_creates_parent_and_blank_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CSV_N2").join("out.csv");
        let table = PixelTable::from_rows(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![1.0, f64::NAN], vec![0.25, 3.0]],
        )
        .unwrap();
        PixelCsv::write(&path, &table).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "a,b\n1,\n0.25,3\n");
    }
}
