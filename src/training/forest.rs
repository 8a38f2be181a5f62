//! Random forest regression
//!
//! Bagged CART trees: each tree is grown on a bootstrap sample, splitting on
//! the threshold that minimizes the summed squared error of both children.
//! Predictions average the trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{HoopsError, Result};

#[derive(Debug, Clone, Copy)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    cost: f64,
}

fn mean(y: &[f64], indices: &[usize]) -> f64 {
    indices.iter().map(|i| y[*i]).sum::<f64>() / indices.len() as f64
}

/// Lowest-cost split over all features, `None` if no split separates rows
fn best_split(x: &[Vec<f64>], y: &[f64], indices: &[usize]) -> Option<SplitCandidate> {
    let n = indices.len();
    let dim = x[indices[0]].len();
    let total_sum: f64 = indices.iter().map(|i| y[*i]).sum();
    let total_sq: f64 = indices.iter().map(|i| y[*i] * y[*i]).sum();

    let mut best: Option<SplitCandidate> = None;
    let mut sorted = indices.to_vec();
    for feature in 0..dim {
        sorted.sort_by(|a, b| x[*a][feature].total_cmp(&x[*b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..n - 1 {
            let yi = y[sorted[k]];
            left_sum += yi;
            left_sq += yi * yi;

            let here = x[sorted[k]][feature];
            let next = x[sorted[k + 1]][feature];
            if here == next {
                continue;
            }

            let left_n = (k + 1) as f64;
            let right_n = (n - k - 1) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let cost = (left_sq - left_sum * left_sum / left_n) + (right_sq - right_sum * right_sum / right_n);

            if best.as_ref().map_or(true, |b| cost < b.cost) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: (here + next) / 2.0,
                    cost,
                });
            }
        }
    }
    best
}

fn grow(x: &[Vec<f64>], y: &[f64], indices: &[usize], depth: usize, config: &ForestConfig) -> Node {
    let value = mean(y, indices);
    let at_max_depth = config.max_depth.map_or(false, |d| depth >= d);
    let pure = indices.iter().all(|i| y[*i] == y[indices[0]]);
    if indices.len() < config.min_samples_split.max(2) || at_max_depth || pure {
        return Node::Leaf { value };
    }

    let Some(split) = best_split(x, y, indices) else {
        return Node::Leaf { value };
    };
    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|i| x[*i][split.feature] <= split.threshold);

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(grow(x, y, &left, depth + 1, config)),
        right: Box::new(grow(x, y, &right, depth + 1, config)),
    }
}

/// Ensemble of regression trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<Node>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[f64], config: ForestConfig) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(HoopsError::Model(format!(
                "cannot fit {} feature rows against {} targets",
                x.len(),
                y.len()
            )));
        }
        if config.n_estimators == 0 {
            return Err(HoopsError::Model("forest needs at least one tree".to_string()));
        }

        let n = x.len();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let trees: Vec<Node> = (0..config.n_estimators)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                grow(x, y, &sample, 0, &config)
            })
            .collect();

        log::info!(
            "Grew {} trees on {} rows (max depth {})",
            trees.len(),
            n,
            trees.iter().map(Node::depth).max().unwrap_or(0)
        );

        Ok(RandomForest {
            n_features: x[0].len(),
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(HoopsError::Model(format!(
                        "expected {} features, got {}",
                        self.n_features,
                        row.len()
                    )));
                }
                Ok(self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64)
            })
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y = x.iter().map(|r| if r[0] < 20.0 { 10.0 } else { 30.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_single_tree_finds_step() {
        let (x, y) = step_data();
        let indices: Vec<usize> = (0..x.len()).collect();
        let tree = grow(&x, &y, &indices, 0, &ForestConfig::default());
        match &tree {
            Node::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 19.5);
            }
            Node::Leaf { .. } => panic!("expected a split"),
        }
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&[3.0, 0.0]), 10.0);
        assert_eq!(tree.predict(&[35.0, 0.0]), 30.0);
    }

    #[test]
    fn test_forest_predicts_near_targets() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(&x, &y, ForestConfig { n_estimators: 25, ..ForestConfig::default() }).unwrap();
        assert_eq!(forest.n_trees(), 25);
        assert_eq!(forest.n_features(), 2);
        let predictions = forest.predict(&[vec![2.0, 1.0], vec![38.0, 1.0]]).unwrap();
        assert!((predictions[0] - 10.0).abs() < 1.0);
        assert!((predictions[1] - 30.0).abs() < 1.0);
        assert!(forest.predict(&[vec![1.0]]).is_err());
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let (x, y) = step_data();
        let config = ForestConfig { n_estimators: 5, ..ForestConfig::default() };
        assert_eq!(RandomForest::fit(&x, &y, config).unwrap(), RandomForest::fit(&x, &y, config).unwrap());
    }

    #[test]
    fn test_depth_limit() {
        let x: Vec<Vec<f64>> = (0..16).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let indices: Vec<usize> = (0..16).collect();
        let config = ForestConfig { max_depth: Some(2), ..ForestConfig::default() };
        assert_eq!(grow(&x, &y, &indices, 0, &config).depth(), 2);
    }

    #[test]
    fn test_save_and_load() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(&x, &y, ForestConfig { n_estimators: 3, ..ForestConfig::default() }).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forest.json");
        forest.save(&path).unwrap();
        assert_eq!(RandomForest::load(&path).unwrap(), forest);
    }
}
