//! DBSCAN outlier rejection on the RED/NIR plane.
//!
//! Clustering is advisory: when it cannot isolate at least two non-noise
//! pixels the input table is handed back untouched.

use crate::core::stats::nan_median;
use crate::types::{columns, Band, PixelTable, WqError, WqResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Label given to pixels outside every cluster
pub const NOISE: i32 = -1;

/// DBSCAN neighbourhood parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbscanParams {
    /// Neighbourhood radius, in reflectance units
    pub eps: f64,
    /// Neighbours (the point included) needed to seed a cluster
    pub min_samples: usize,
}

/// Named clustering presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum ClusteringPreset {
    M1,
    M2,
    M3,
    M4,
}

impl ClusteringPreset {
    pub const ALL: [ClusteringPreset; 4] = [
        ClusteringPreset::M1,
        ClusteringPreset::M2,
        ClusteringPreset::M3,
        ClusteringPreset::M4,
    ];

    pub fn params(self) -> DbscanParams {
        match self {
            ClusteringPreset::M1 => DbscanParams { eps: 0.005, min_samples: 3 },
            ClusteringPreset::M2 => DbscanParams { eps: 0.01, min_samples: 5 },
            ClusteringPreset::M3 => DbscanParams { eps: 0.02, min_samples: 10 },
            ClusteringPreset::M4 => DbscanParams { eps: 0.01, min_samples: 10 },
        }
    }
}

impl Default for ClusteringPreset {
    fn default() -> Self {
        ClusteringPreset::M4
    }
}

impl std::fmt::Display for ClusteringPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for ClusteringPreset {
    type Err = WqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "M1" => Ok(ClusteringPreset::M1),
            "M2" => Ok(ClusteringPreset::M2),
            "M3" => Ok(ClusteringPreset::M3),
            "M4" => Ok(ClusteringPreset::M4),
            other => Err(WqError::Config(format!(
                "Unknown clustering preset '{}', expected one of M1, M2, M3, M4",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ClusteringPreset {
    type Error = WqError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Label every point: `NOISE` or a cluster index counted from zero in
/// order of discovery.
pub fn dbscan(points: &[[f64; 2]], params: DbscanParams) -> Vec<i32> {
    // neighbourhoods are recomputed on demand, never stored
    let region_query = |i: usize| -> Vec<usize> {
        (0..points.len())
            .filter(|&j| {
                let dx = points[i][0] - points[j][0];
                let dy = points[i][1] - points[j][1];
                (dx * dx + dy * dy).sqrt() <= params.eps
            })
            .collect()
    };

    let mut labels = vec![NOISE; points.len()];
    let mut next_label = 0;
    for seed in 0..points.len() {
        if labels[seed] != NOISE {
            continue;
        }
        let seed_neighbours = region_query(seed);
        if seed_neighbours.len() < params.min_samples {
            continue;
        }
        labels[seed] = next_label;
        let mut frontier = Vec::new();
        for q in seed_neighbours {
            if labels[q] == NOISE {
                labels[q] = next_label;
                frontier.push(q);
            }
        }
        while let Some(p) = frontier.pop() {
            let reach = region_query(p);
            // border points join but do not grow the cluster
            if reach.len() < params.min_samples {
                continue;
            }
            for q in reach {
                if labels[q] == NOISE {
                    labels[q] = next_label;
                    frontier.push(q);
                }
            }
        }
        next_label += 1;
    }
    labels
}

/// One DBSCAN cluster of an image
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub label: i32,
    /// Row positions in the clustered table
    pub members: Vec<usize>,
    pub band_medians: BTreeMap<Band, f64>,
}

/// Either the selected cluster or the untouched input
#[derive(Debug, Clone)]
pub enum ClusterOutcome {
    Clustered {
        table: PixelTable,
        selected: i32,
        clusters: Vec<Cluster>,
    },
    Reverted {
        table: PixelTable,
        /// Pixels left once noise was removed
        non_noise: usize,
    },
}

impl ClusterOutcome {
    pub fn table(&self) -> &PixelTable {
        match self {
            ClusterOutcome::Clustered { table, .. } | ClusterOutcome::Reverted { table, .. } => table,
        }
    }

    pub fn into_table(self) -> PixelTable {
        match self {
            ClusterOutcome::Clustered { table, .. } | ClusterOutcome::Reverted { table, .. } => table,
        }
    }

    pub fn is_reverted(&self) -> bool {
        matches!(self, ClusterOutcome::Reverted { .. })
    }
}

/// Keeps the cluster whose far-infrared median is closest to zero
pub struct OutlierClusterer {
    preset: ClusteringPreset,
    features: [Band; 2],
    selection_band: Band,
}

impl OutlierClusterer {
    pub fn new(preset: ClusteringPreset) -> Self {
        Self {
            preset,
            features: [Band::RED, Band::NIR],
            selection_band: Band::FAR_IR,
        }
    }

    pub fn preset(&self) -> ClusteringPreset {
        self.preset
    }

    /// DBSCAN labels for every row of the table
    pub fn labels(&self, table: &PixelTable) -> WqResult<Vec<i32>> {
        let x = table.band(self.features[0])?;
        let y = table.band(self.features[1])?;
        let points: Vec<[f64; 2]> = x.iter().zip(y.iter()).map(|(&a, &b)| [a, b]).collect();
        Ok(dbscan(&points, self.preset.params()))
    }

    /// Group rows by label, noise excluded, sorted by label
    pub fn clusters(&self, table: &PixelTable, labels: &[i32]) -> WqResult<Vec<Cluster>> {
        let mut members: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (row, &label) in labels.iter().enumerate() {
            if label != NOISE {
                members.entry(label).or_default().push(row);
            }
        }

        let mut clusters = Vec::with_capacity(members.len());
        for (label, rows) in members {
            let mut band_medians = BTreeMap::new();
            for band in Band::ALL {
                let column = table.band(band)?;
                let values: Vec<f64> = rows.iter().map(|&r| column[r]).collect();
                band_medians.insert(band, nan_median(&values));
            }
            clusters.push(Cluster {
                label,
                members: rows,
                band_medians,
            });
        }
        Ok(clusters)
    }

    /// Cluster the table and keep the dominant clean cluster.
    ///
    /// Falls back to the input table when at most one pixel is left after
    /// noise removal.
    pub fn apply(&self, mut table: PixelTable) -> WqResult<ClusterOutcome> {
        let labels = self.labels(&table)?;
        let non_noise = labels.iter().filter(|&&l| l != NOISE).count();
        if non_noise <= 1 {
            log::info!(
                "DBSCAN {} left {} non-noise pixels out of {}, keeping the unclustered table",
                self.preset,
                non_noise,
                table.len()
            );
            return Ok(ClusterOutcome::Reverted { table, non_noise });
        }

        let clusters = self.clusters(&table, &labels)?;
        let selected = clusters
            .iter()
            .min_by(|a, b| {
                let da = a.band_medians[&self.selection_band].abs();
                let db = b.band_medians[&self.selection_band].abs();
                da.total_cmp(&db)
            })
            .map(|c| c.label)
            .ok_or_else(|| WqError::Processing("No cluster to select".to_string()))?;

        table.push_column(columns::CLUSTER, labels.iter().map(|&l| f64::from(l)).collect())?;
        let keep: Vec<bool> = labels.iter().map(|&l| l == selected).collect();
        table.retain_rows(&keep);

        log::debug!(
            "DBSCAN {} found {} clusters, kept cluster {} with {} pixels",
            self.preset,
            clusters.len(),
            selected,
            table.len()
        );

        Ok(ClusterOutcome::Clustered {
            table,
            selected,
            clusters,
        })
    }
}
