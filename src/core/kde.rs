//! Red-band peak filter.
//!
//! Fits a Gaussian kernel density over the RED reflectances of one image and
//! drops pixels brighter than the lowest density peak (or the mean, whichever
//! is smaller) plus a 10 % margin.

use crate::core::stats::{nan_mean, nan_std};
use crate::types::{Band, PixelTable, WqResult};
use std::f64::consts::PI;

/// Margin added above the selected peak before rows are dropped
pub const PEAK_MARGIN: f64 = 0.1;

/// One-dimensional Gaussian KDE with Silverman's bandwidth rule
#[derive(Debug, Clone)]
pub struct GaussianKde {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl GaussianKde {
    /// None when there are fewer than two samples or they have no spread
    pub fn fit(samples: &[f64]) -> Option<Self> {
        let n = samples.len();
        if n < 2 {
            return None;
        }
        let std = nan_std(samples);
        if !std.is_finite() || std <= 0.0 {
            return None;
        }
        let factor = (n as f64 * 3.0 / 4.0).powf(-1.0 / 5.0);
        Some(Self {
            samples: samples.to_vec(),
            bandwidth: factor * std,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn density(&self, x: f64) -> f64 {
        let h = self.bandwidth;
        let norm = 1.0 / (h * (2.0 * PI).sqrt() * self.samples.len() as f64);
        self.samples
            .iter()
            .map(|&s| {
                let z = (x - s) / h;
                (-0.5 * z * z).exp()
            })
            .sum::<f64>()
            * norm
    }
}

/// Positions of strict interior local maxima
pub fn local_maxima(values: &[f64]) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }
    (1..values.len() - 1)
        .filter(|&i| values[i] > values[i - 1] && values[i] > values[i + 1])
        .collect()
}

/// Sorted RED values at which the fitted density peaks
pub fn density_peaks(samples: &[f64], kde: &GaussianKde) -> Vec<f64> {
    let mut curve: Vec<(f64, f64)> = samples.iter().map(|&x| (x, kde.density(x))).collect();
    curve.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    let ys: Vec<f64> = curve.iter().map(|p| p.1).collect();
    local_maxima(&ys).into_iter().map(|i| curve[i].0).collect()
}

#[derive(Debug, Clone, Default)]
pub struct RedPeakFilter;

impl RedPeakFilter {
    pub fn new() -> Self {
        Self
    }

    /// Upper RED limit for the table, or None when the density cannot be fitted
    pub fn threshold(&self, table: &PixelTable) -> WqResult<Option<f64>> {
        let red: Vec<f64> = table.band(Band::RED)?.to_vec();

        let mut distinct = red.clone();
        distinct.sort_by(|a, b| a.total_cmp(b));
        distinct.dedup();
        if distinct.len() < 2 && red.len() < 4 {
            return Ok(None);
        }
        let kde = match GaussianKde::fit(&red) {
            Some(kde) => kde,
            None => return Ok(None),
        };

        let mean = nan_mean(&red);
        let lowest = density_peaks(&red, &kde)
            .into_iter()
            .chain(std::iter::once(mean))
            .fold(f64::INFINITY, f64::min);
        Ok(Some(lowest + PEAK_MARGIN * lowest))
    }

    /// Drop rows whose RED exceeds the threshold; returns how many were removed
    pub fn apply(&self, table: &mut PixelTable) -> WqResult<usize> {
        let limit = match self.threshold(table)? {
            Some(limit) => limit,
            None => {
                log::info!(
                    "Not enough RED spread for a density fit ({} pixels), peak filter skipped",
                    table.len()
                );
                return Ok(0);
            }
        };
        let red = table.band(Band::RED)?;
        let keep: Vec<bool> = red.iter().map(|&v| !(v > limit)).collect();
        let removed = table.retain_rows(&keep);
        table.reset_index();
        log::debug!("RED peak filter at {:.5} removed {} pixels", limit, removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn red_table(values: &[f64]) -> PixelTable {
        PixelTable::from_rows(
            vec![Band::RED.column().to_string()],
            values.iter().map(|&v| vec![v]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_silverman_bandwidth() {
        let samples = [1.0, 2.0, 3.0, 4.0];
        let kde = GaussianKde::fit(&samples).unwrap();
        let expected = 3.0f64.powf(-0.2) * 1.2909944487358056;
        assert_relative_eq!(kde.bandwidth(), expected, max_relative = 1e-12);
    }

    #[test]
    fn test_density_integrates_to_one() {
        let kde = GaussianKde::fit(&[0.0, 1.0, 5.0]).unwrap();
        let step = 0.01;
        let area: f64 = (-2000..3000).map(|i| kde.density(i as f64 * step) * step).sum();
        assert_relative_eq!(area, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_local_maxima_are_strict_and_interior() {
        assert_eq!(local_maxima(&[0.0, 2.0, 1.0, 3.0, 0.5]), vec![1, 3]);
        assert!(local_maxima(&[3.0, 2.0, 1.0]).is_empty());
        assert!(local_maxima(&[1.0, 2.0, 2.0, 1.0]).is_empty());
    }

    #[test]
    fn test_bright_tail_is_dropped() {
        let mut values = vec![0.0200, 0.0201, 0.0202, 0.0203, 0.0204, 0.0205];
        values.extend([0.30, 0.31]);
        let mut table = red_table(&values);
        let removed = RedPeakFilter::new().apply(&mut table).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(table.len(), 6);
        assert_eq!(table.row_ids(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_constant_red_is_a_no_op() {
        let mut table = red_table(&[0.05; 6]);
        assert_eq!(RedPeakFilter::new().apply(&mut table).unwrap(), 0);
        assert_eq!(table.len(), 6);

        let mut tiny = red_table(&[0.05]);
        assert_eq!(RedPeakFilter::new().apply(&mut tiny).unwrap(), 0);
    }
}
