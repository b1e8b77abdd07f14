//! Isolation forest.

use super::AnomalyDetector;
use anyhow::{Result, bail};
use rand::prelude::*;

/// Rows drawn for each tree, capped by the dataset size.
const SUB_SAMPLE: usize = 256;

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Average path length of an unsuccessful search in a binary tree of `n` nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn build(data: &[Vec<f64>], rows: &[usize], depth: usize, limit: usize, rng: &mut StdRng) -> Self {
        if depth >= limit || rows.len() <= 1 {
            return Node::Leaf { size: rows.len() };
        }

        let width = data[rows[0]].len();
        let splittable: Vec<(usize, f64, f64)> = (0..width)
            .filter_map(|f| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    (lo.min(data[r][f]), hi.max(data[r][f]))
                });
                (hi > lo).then_some((f, lo, hi))
            })
            .collect();

        let Some(&(feature, lo, hi)) = splittable.choose(rng) else {
            return Node::Leaf { size: rows.len() };
        };
        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&r| data[r][feature] < threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(Node::build(data, &left, depth + 1, limit, rng)),
            right: Box::new(Node::build(data, &right, depth + 1, limit, rng)),
        }
    }

    fn path_length(&self, point: &[f64], depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if point[*feature] < *threshold {
                    left.path_length(point, depth + 1)
                } else {
                    right.path_length(point, depth + 1)
                }
            }
        }
    }
}

/// Scores rows by how quickly random splits isolate them.
#[derive(Debug, Clone)]
pub struct IsolationDetector {
    trees: usize,
    seed: u64,
}

impl IsolationDetector {
    pub fn new(trees: usize, seed: u64) -> Self {
        Self { trees, seed }
    }
}

impl AnomalyDetector for IsolationDetector {
    fn name(&self) -> &'static str {
        "isolation"
    }

    fn score(&self, data: &[Vec<f64>]) -> Result<Vec<f64>> {
        let n = data.len();
        let psi = SUB_SAMPLE.min(n);
        let normalizer = average_path_length(psi);
        if self.trees == 0 || normalizer <= 0.0 {
            bail!("need at least 2 rows and 1 tree, got {} rows and {} trees", n, self.trees);
        }

        let limit = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let all: Vec<usize> = (0..n).collect();

        let forest: Vec<Node> = (0..self.trees)
            .map(|_| {
                let sample: Vec<usize> = all.choose_multiple(&mut rng, psi).copied().collect();
                Node::build(data, &sample, 0, limit, &mut rng)
            })
            .collect();

        let scores = data
            .iter()
            .map(|point| {
                let mean_path = forest
                    .iter()
                    .map(|tree| tree.path_length(point, 0))
                    .sum::<f64>()
                    / forest.len() as f64;
                2f64.powf(-mean_path / normalizer)
            })
            .collect();

        Ok(scores)
    }
}
