//! Local outlier factor.

use super::AnomalyDetector;
use anyhow::{Result, bail};

/// Added to mean reachability distances so duplicate points stay finite.
const REACHABILITY_EPSILON: f64 = 1e-10;

/// Scores rows by how much sparser their neighbourhood is than their
/// neighbours' neighbourhoods.
#[derive(Debug, Clone)]
pub struct DensityDetector {
    neighbors: usize,
}

impl DensityDetector {
    pub fn new(neighbors: usize) -> Self {
        Self { neighbors }
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

impl AnomalyDetector for DensityDetector {
    fn name(&self) -> &'static str {
        "density"
    }

    fn score(&self, data: &[Vec<f64>]) -> Result<Vec<f64>> {
        let n = data.len();
        let k = self.neighbors.min(n.saturating_sub(1));
        if k == 0 {
            bail!("need at least 2 rows for neighbour search, got {}", n);
        }

        // k nearest neighbours of each row, closest first
        let mut neighbors: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        for (i, row) in data.iter().enumerate() {
            let mut dists: Vec<(usize, f64)> = data
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, other)| (j, distance(row, other)))
                .collect();
            dists.select_nth_unstable_by(k - 1, |a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            dists.truncate(k);
            dists.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            neighbors.push(dists);
        }

        let k_distance: Vec<f64> = neighbors.iter().map(|nb| nb[k - 1].1).collect();

        let lrd: Vec<f64> = neighbors
            .iter()
            .map(|nb| {
                let reach: f64 = nb.iter().map(|(j, d)| d.max(k_distance[*j])).sum();
                1.0 / (reach / k as f64 + REACHABILITY_EPSILON)
            })
            .collect();

        let scores = neighbors
            .iter()
            .enumerate()
            .map(|(i, nb)| {
                let mean_lrd = nb.iter().map(|(j, _)| lrd[*j]).sum::<f64>() / k as f64;
                mean_lrd / lrd[i]
            })
            .collect();

        Ok(scores)
    }
}
