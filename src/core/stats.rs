//! NaN-skipping descriptive statistics over pixel columns.

use serde::{Deserialize, Serialize};

fn finite_sorted<'a, I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut kept: Vec<f64> = values.into_iter().copied().filter(|v| !v.is_nan()).collect();
    kept.sort_by(|a, b| a.total_cmp(b));
    kept
}

/// Mean of the non-NaN values, NaN when there are none
pub fn nan_mean<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Sample standard deviation (n - 1) of the non-NaN values
pub fn nan_std<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64> + Clone,
{
    let mean = nan_mean(values.clone());
    let (sq, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + (v - mean) * (v - mean), c + 1));
    if count < 2 {
        f64::NAN
    } else {
        (sq / (count - 1) as f64).sqrt()
    }
}

/// Linear-interpolated quantile of already sorted data, `q` in [0, 1]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

pub fn nan_median<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    quantile_sorted(&finite_sorted(values), 0.5)
}

/// count / mean / std / min / quartiles / max of one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

impl Describe {
    pub fn of<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a f64> + Clone,
    {
        let sorted = finite_sorted(values.clone());
        Self {
            count: sorted.len(),
            mean: nan_mean(values.clone()),
            std: nan_std(values),
            min: sorted.first().copied().unwrap_or(f64::NAN),
            p25: quantile_sorted(&sorted, 0.25),
            p50: quantile_sorted(&sorted, 0.50),
            p75: quantile_sorted(&sorted, 0.75),
            max: sorted.last().copied().unwrap_or(f64::NAN),
        }
    }

    /// All-zero statistics reported for images without surviving pixels
    pub fn zeroed() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            std: 0.0,
            min: 0.0,
            p25: 0.0,
            p50: 0.0,
            p75: 0.0,
            max: 0.0,
        }
    }
}
