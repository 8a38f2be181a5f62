//! Train/test splitting and feature scaling

use crate::{HoopsError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Shuffle row indices with a fixed seed and hold out `test_ratio` of them.
///
/// The test size is rounded up; at least one row stays in each part.
pub fn train_test_split(rows: usize, test_ratio: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if rows < 2 {
        return Err(HoopsError::Model(format!(
            "need at least 2 rows to split, got {}",
            rows
        )));
    }
    if !(0.0..1.0).contains(&test_ratio) || test_ratio == 0.0 {
        return Err(HoopsError::Model(format!(
            "test ratio must be in (0, 1), got {}",
            test_ratio
        )));
    }

    let mut indices: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = ((rows as f64 * test_ratio).ceil() as usize).clamp(1, rows - 1);
    let test = indices[..test_size].to_vec();
    let train = indices[test_size..].to_vec();
    Ok((train, test))
}

/// Pick rows by index
pub fn take_rows<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|i| values[*i].clone()).collect()
}

/// Per-column z-score scaling fitted on training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNormalization {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl FeatureNormalization {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        let n = rows.len().max(1) as f64;

        let mut sum = vec![0.0f64; dim];
        let mut sum_sq = vec![0.0f64; dim];
        for row in rows {
            for (j, value) in row.iter().enumerate().take(dim) {
                sum[j] += value;
                sum_sq[j] += value * value;
            }
        }

        let mean: Vec<f64> = sum.iter().map(|s| s / n).collect();
        let std = sum_sq
            .iter()
            .zip(mean.iter())
            .map(|(sq, m)| ((sq / n - m * m).max(0.0).sqrt()).max(0.001) as f32)
            .collect();

        FeatureNormalization {
            mean: mean.into_iter().map(|m| m as f32).collect(),
            std,
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn normalize_row(&self, row: &[f64]) -> Vec<f32> {
        row.iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(x, (m, s))| (*x as f32 - m) / s)
            .collect()
    }
}

/// Scaling for a single target column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetNormalization {
    pub mean: f32,
    pub std: f32,
}

impl TargetNormalization {
    pub fn fit(values: &[f64]) -> Self {
        let n = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        TargetNormalization {
            mean: mean as f32,
            std: (var.sqrt() as f32).max(0.001),
        }
    }

    pub fn normalize(&self, value: f64) -> f32 {
        (value as f32 - self.mean) / self.std
    }

    pub fn denormalize(&self, normalized: f32) -> f64 {
        (normalized * self.std + self.mean) as f64
    }
}
