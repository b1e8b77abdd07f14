//! Mahalanobis distance from a robust covariance envelope.

use super::AnomalyDetector;
use anyhow::{Context, Result, anyhow, bail};

/// Added to the covariance diagonal before inversion.
const RIDGE: f64 = 1e-6;

/// Pivots smaller than this make the covariance singular.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Scores rows by their distance from the centre of the most central rows.
#[derive(Debug, Clone)]
pub struct CovarianceDetector {
    support_fraction: f64,
}

impl CovarianceDetector {
    pub fn new(support_fraction: f64) -> Self {
        Self { support_fraction }
    }
}

impl Default for CovarianceDetector {
    fn default() -> Self {
        Self::new(0.75)
    }
}

struct Envelope {
    center: Vec<f64>,
    precision: Vec<Vec<f64>>,
}

impl Envelope {
    fn fit(data: &[Vec<f64>], rows: &[usize]) -> Result<Self> {
        let d = data[rows[0]].len();
        let m = rows.len() as f64;

        let mut center = vec![0.0; d];
        for &r in rows {
            for (c, v) in center.iter_mut().zip(&data[r]) {
                *c += v / m;
            }
        }

        let mut covariance = vec![vec![0.0; d]; d];
        for &r in rows {
            for a in 0..d {
                let da = data[r][a] - center[a];
                for b in a..d {
                    covariance[a][b] += da * (data[r][b] - center[b]);
                }
            }
        }
        let denom = (m - 1.0).max(1.0);
        for a in 0..d {
            for b in a..d {
                covariance[a][b] /= denom;
                covariance[b][a] = covariance[a][b];
            }
            covariance[a][a] += RIDGE;
        }

        let precision = invert(covariance).context("covariance matrix is singular")?;
        Ok(Self { center, precision })
    }

    fn squared_distance(&self, point: &[f64]) -> f64 {
        let diff: Vec<f64> = point.iter().zip(&self.center).map(|(x, c)| x - c).collect();
        self.precision
            .iter()
            .zip(&diff)
            .map(|(row, da)| da * row.iter().zip(&diff).map(|(p, db)| p * db).sum::<f64>())
            .sum()
    }
}

/// Gauss-Jordan inversion with partial pivoting.
fn invert(mut matrix: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut inverse: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))
            .ok_or_else(|| anyhow!("empty matrix"))?;
        let pivot = matrix[pivot_row][col];
        if !pivot.is_finite() || pivot.abs() < PIVOT_TOLERANCE {
            bail!("pivot {:e} in column {}", pivot, col);
        }
        matrix.swap(col, pivot_row);
        inverse.swap(col, pivot_row);

        for j in 0..n {
            matrix[col][j] /= pivot;
            inverse[col][j] /= pivot;
        }
        let pivot_values = matrix[col].clone();
        let inverse_values = inverse[col].clone();
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = matrix[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                matrix[row][j] -= factor * pivot_values[j];
                inverse[row][j] -= factor * inverse_values[j];
            }
        }
    }

    Ok(inverse)
}

impl AnomalyDetector for CovarianceDetector {
    fn name(&self) -> &'static str {
        "covariance"
    }

    fn score(&self, data: &[Vec<f64>]) -> Result<Vec<f64>> {
        let n = data.len();
        let d = data.first().map_or(0, Vec::len);
        if d == 0 || n <= d {
            bail!("need more rows than columns, got {} rows and {} columns", n, d);
        }

        let all: Vec<usize> = (0..n).collect();
        let initial = Envelope::fit(data, &all)?;
        let distances: Vec<f64> = data.iter().map(|p| initial.squared_distance(p)).collect();

        // One concentration step over the most central rows
        let support = ((self.support_fraction * n as f64).ceil() as usize).clamp(d + 1, n);
        let mut order = all;
        order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]).then(a.cmp(&b)));
        order.truncate(support);
        let robust = Envelope::fit(data, &order)?;

        let scores: Vec<f64> = data
            .iter()
            .map(|p| robust.squared_distance(p).max(0.0).sqrt())
            .collect();
        if scores.iter().any(|s| !s.is_finite()) {
            bail!("non-finite distance");
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert_identity_and_known_matrix() {
        let inv = invert(vec![vec![4.0, 7.0], vec![2.0, 6.0]]).unwrap();
        assert!((inv[0][0] - 0.6).abs() < 1e-9);
        assert!((inv[0][1] + 0.7).abs() < 1e-9);
        assert!((inv[1][0] + 0.2).abs() < 1e-9);
        assert!((inv[1][1] - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_invert_singular() {
        assert!(invert(vec![vec![1.0, 2.0], vec![2.0, 4.0]]).is_err());
    }

    #[test]
    fn test_far_point_scores_highest() {
        let mut data: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let x = (i % 8) as f64 - 3.5;
                vec![x, x * 0.5 + ((i / 8) as f64 - 2.0) * 0.3]
            })
            .collect();
        data.push(vec![-6.0, 9.0]);

        let scores = CovarianceDetector::default().score(&data).unwrap();
        let top = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(top, 40);
    }

    #[test]
    fn test_too_few_rows_fails() {
        let data = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        assert!(CovarianceDetector::default().score(&data).is_err());
    }
}
