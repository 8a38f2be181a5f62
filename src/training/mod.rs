//! Model training
//!
//! Fits per-stat regression models on rolling-average feature tables,
//! evaluates them on a seeded hold-out split and stores them on disk.

pub mod forest;
pub mod linear;
pub mod metrics;
pub mod split;

pub use forest::{ForestConfig, RandomForest};
pub use linear::{LinearFitConfig, LinearRegressor, LinearScaling};
pub use metrics::{Metrics, TrainingHistory};
pub use split::train_test_split;

use crate::features::rolling::FeatureTable;
use crate::{HoopsError, Result, Stat, TrainingConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "manifest.json";
const WEIGHTS_STEM: &str = "weights";
const FOREST_FILE: &str = "forest.json";

/// Regression model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    Forest,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Linear => f.write_str("linear regression"),
            ModelKind::Forest => f.write_str("random forest"),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(ModelKind::Linear),
            "forest" | "random-forest" => Ok(ModelKind::Forest),
            _ => Err(format!("Unknown model: {}. Use linear or forest.", s)),
        }
    }
}

/// Everything needed to rebuild a saved model besides its weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub kind: ModelKind,
    pub target: Stat,
    pub feature_names: Vec<String>,
    pub metrics: Metrics,
    /// Present for linear models
    pub scaling: Option<LinearScaling>,
}

#[derive(Debug)]
enum Estimator {
    Linear(LinearRegressor),
    Forest(RandomForest),
}

/// A fitted model for one target stat
#[derive(Debug)]
pub struct TrainedModel {
    manifest: ModelManifest,
    estimator: Estimator,
}

/// Directory a player's model for `target` is stored in
pub fn model_path(model_dir: &Path, player: &str, target: Stat) -> PathBuf {
    let slug: String = player
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    model_dir.join(format!("{}_{}_predictor", slug, target.code()))
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        self.manifest.kind
    }

    pub fn target(&self) -> Stat {
        self.manifest.target
    }

    pub fn feature_names(&self) -> &[String] {
        &self.manifest.feature_names
    }

    pub fn metrics(&self) -> &Metrics {
        &self.manifest.metrics
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        match &self.estimator {
            Estimator::Linear(model) => model.predict(rows),
            Estimator::Forest(model) => model.predict(rows),
        }
    }

    /// Write the manifest and weights into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        match &self.estimator {
            Estimator::Linear(model) => model.save(&dir.join(WEIGHTS_STEM))?,
            Estimator::Forest(model) => model.save(&dir.join(FOREST_FILE))?,
        }
        let manifest = std::fs::File::create(dir.join(MANIFEST_FILE))?;
        serde_json::to_writer_pretty(manifest, &self.manifest)?;
        log::info!("Model saved to {}", dir.display());
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(HoopsError::NotFound(format!("model at {}", dir.display())));
        }
        let manifest: ModelManifest =
            serde_json::from_reader(std::io::BufReader::new(std::fs::File::open(manifest_path)?))?;

        let estimator = match manifest.kind {
            ModelKind::Linear => {
                let scaling = manifest.scaling.clone().ok_or_else(|| {
                    HoopsError::Model("linear model manifest has no scaling".to_string())
                })?;
                Estimator::Linear(LinearRegressor::load(&dir.join(WEIGHTS_STEM), scaling)?)
            }
            ModelKind::Forest => Estimator::Forest(RandomForest::load(&dir.join(FOREST_FILE))?),
        };
        Ok(TrainedModel { manifest, estimator })
    }
}

/// Split, fit and evaluate a model for `target`
pub fn train_model(
    table: &FeatureTable,
    target: Stat,
    kind: ModelKind,
    config: &TrainingConfig,
) -> Result<TrainedModel> {
    let (x, y) = table.xy(target);
    if x.is_empty() {
        return Err(HoopsError::Model(format!("no rows with a recorded {}", target)));
    }

    let (train_idx, test_idx) = train_test_split(x.len(), config.test_ratio, config.seed)?;
    let x_train = split::take_rows(&x, &train_idx);
    let y_train = split::take_rows(&y, &train_idx);
    let x_test = split::take_rows(&x, &test_idx);
    let y_test = split::take_rows(&y, &test_idx);
    log::info!(
        "Training {} for {}: {} train rows, {} test rows",
        kind,
        target,
        x_train.len(),
        x_test.len()
    );

    let (estimator, scaling) = match kind {
        ModelKind::Linear => {
            let fit_config = LinearFitConfig {
                epochs: config.epochs,
                learning_rate: config.learning_rate,
            };
            let (model, history) = LinearRegressor::fit(&x_train, &y_train, fit_config)?;
            if let Some(loss) = history.final_loss() {
                log::debug!("Final training loss {:.6} (best at epoch {})", loss, history.best_epoch + 1);
            }
            let scaling = model.scaling().clone();
            (Estimator::Linear(model), Some(scaling))
        }
        ModelKind::Forest => {
            let forest_config = ForestConfig {
                n_estimators: config.n_estimators,
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                seed: config.seed,
            };
            (Estimator::Forest(RandomForest::fit(&x_train, &y_train, forest_config)?), None)
        }
    };

    let mut model = TrainedModel {
        manifest: ModelManifest {
            kind,
            target,
            feature_names: table.columns.clone(),
            metrics: Metrics::evaluate(&[], &[]),
            scaling,
        },
        estimator,
    };
    let predictions = model.predict(&x_test)?;
    model.manifest.metrics = Metrics::evaluate(&y_test, &predictions);
    log::info!("{} for {}: {}", kind, target, model.manifest.metrics);
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::rolling::FeatureRow;
    use crate::{Config, StatLine};
    use chrono::NaiveDate;

    fn table() -> FeatureTable {
        let rows = (0..30)
            .map(|i| {
                let a = i as f64;
                let b = ((i * 7) % 4) as f64;
                let mut targets = StatLine::new();
                targets.insert(Stat::Points, 1.5 * a + 2.0 * b + 4.0);
                FeatureRow {
                    game_id: format!("g{}", i),
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i),
                    features: vec![a, b],
                    targets,
                }
            })
            .collect();
        FeatureTable {
            columns: vec!["A".to_string(), "B".to_string()],
            rows,
        }
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            n_estimators: 10,
            ..Config::default().training
        }
    }

    #[test]
    fn test_model_path() {
        let path = model_path(Path::new("models"), "LeBron James", Stat::Points);
        assert_eq!(path, Path::new("models").join("lebron_james_PTS_predictor"));
    }

    #[test]
    fn test_linear_model_fits_and_reloads() {
        let model = train_model(&table(), Stat::Points, ModelKind::Linear, &config()).unwrap();
        assert_eq!(model.metrics().samples, 6);
        assert!(model.metrics().r2 > 0.99);

        let dir = tempfile::tempdir().unwrap();
        model.save(dir.path()).unwrap();
        let loaded = TrainedModel::load(dir.path()).unwrap();
        assert_eq!(loaded.kind(), ModelKind::Linear);
        assert_eq!(loaded.feature_names(), &["A".to_string(), "B".to_string()]);

        let a = model.predict(&[vec![10.0, 1.0]]).unwrap()[0];
        let b = loaded.predict(&[vec![10.0, 1.0]]).unwrap()[0];
        assert!((a - b).abs() < 1e-6);
        assert!((a - 21.0).abs() < 0.2);
    }

    #[test]
    fn test_forest_model_round_trip() {
        let model = train_model(&table(), Stat::Points, ModelKind::Forest, &config()).unwrap();
        assert!(model.metrics().mse.is_finite());

        let dir = tempfile::tempdir().unwrap();
        model.save(dir.path()).unwrap();
        let loaded = TrainedModel::load(dir.path()).unwrap();
        assert_eq!(loaded.target(), Stat::Points);
        assert_eq!(
            model.predict(&[vec![5.0, 2.0]]).unwrap(),
            loaded.predict(&[vec![5.0, 2.0]]).unwrap()
        );
    }

    #[test]
    fn test_missing_target_is_an_error() {
        assert!(train_model(&table(), Stat::Blocks, ModelKind::Forest, &config()).is_err());
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(TrainedModel::load(dir.path()), Err(HoopsError::NotFound(_))));
    }
}
