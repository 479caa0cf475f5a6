//! Suspended particulate matter estimation.
//!
//! Two empirical curves are blended on the red reflectance: a power law that
//! holds for clear water and a NIR/RED ratio model that holds for turbid water.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Coefficients of the blended SPM model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpmModel {
    /// Low regime `a * x^b + c`, x = RED / pi
    pub low: [f64; 3],
    /// High regime `k * (NIR / RED)^p`
    pub high: [f64; 2],
    /// Centre of the transition, in RED / pi units
    pub cutoff: f64,
    /// Half width of the transition window; 0 makes it a hard step
    pub cutoff_delta: f64,
}

impl Default for SpmModel {
    fn default() -> Self {
        Self {
            // fitted on Amazon floodplain data
            low: [2.79101975e+05, 2.34858344e+00, 4.20023206e+00],
            high: [759.12, 1.92],
            cutoff: 0.027,
            cutoff_delta: 0.007,
        }
    }
}

/// The three parts of one SPM evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpmComponents {
    pub low: f64,
    pub high: f64,
    pub transition: f64,
}

impl SpmComponents {
    pub fn blended(&self) -> f64 {
        (1.0 - self.transition) * self.low + self.transition * self.high
    }
}

impl SpmModel {
    /// Weight of the high regime for a pi-normalized red reflectance
    pub fn transition_coefficient(&self, red_norm: f64) -> f64 {
        if self.cutoff_delta == 0.0 {
            return if red_norm <= self.cutoff { 0.0 } else { 1.0 };
        }
        let lower = self.cutoff - self.cutoff_delta;
        let upper = self.cutoff + self.cutoff_delta;
        ((red_norm - lower) / (upper - lower)).clamp(0.0, 1.0)
    }

    pub fn components(&self, red: f64, nir: f64) -> SpmComponents {
        let red_norm = red / PI;
        let nir_norm = nir / PI;

        let [a, b, c] = self.low;
        let mut low = a * red_norm.powf(b) + c;
        if low.is_nan() {
            low = 0.0;
        }

        let [k, p] = self.high;
        let high = k * (nir_norm / red_norm).powf(p);

        SpmComponents {
            low,
            high,
            transition: self.transition_coefficient(red_norm),
        }
    }

    /// SPM for one pair of RED (665 nm) and NIR (865 nm) reflectances
    pub fn estimate(&self, red: f64, nir: f64) -> f64 {
        self.components(red, nir).blended()
    }

    /// Element-wise SPM over two columns
    pub fn estimate_many<'a, R, N>(&self, red: R, nir: N) -> Vec<f64>
    where
        R: IntoIterator<Item = &'a f64>,
        N: IntoIterator<Item = &'a f64>,
    {
        red.into_iter()
            .zip(nir)
            .map(|(&r, &n)| self.estimate(r, n))
            .collect()
    }
}
