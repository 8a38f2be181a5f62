//! Model inference for next-game predictions

use std::path::{Path, PathBuf};

use crate::features::rolling::{fill_missing_with_median, next_game_features, WINDOWS};
use crate::training::{model_path, ModelKind, TrainedModel};
use crate::{GameRecord, HoopsError, Result, Stat};

/// Predicted value for one stat
#[derive(Debug, Clone, PartialEq)]
pub struct StatPrediction {
    pub target: Stat,
    pub kind: ModelKind,
    pub value: f64,
}

/// Apply a trained model to the features of the player's next game.
///
/// Features are built from the most recent games of `games` (ordered by
/// date ascending) after filling gaps with column medians.
pub fn predict_next_game(model: &TrainedModel, games: &[GameRecord]) -> Result<f64> {
    let mut filled = games.to_vec();
    fill_missing_with_median(&mut filled);
    let history = WINDOWS.iter().copied().max().unwrap_or(0);
    let recent = &filled[filled.len().saturating_sub(history)..];

    let features = next_game_features(recent)?;
    let row = model
        .feature_names()
        .iter()
        .map(|name| {
            features
                .get(name)
                .copied()
                .ok_or_else(|| HoopsError::Model(format!("feature {} unavailable for prediction", name)))
        })
        .collect::<Result<Vec<f64>>>()?;

    model
        .predict(&[row])?
        .first()
        .copied()
        .ok_or_else(|| HoopsError::Model("model returned no prediction".to_string()))
}

/// Loads a player's saved models from the model directory
pub struct Predictor {
    model_dir: PathBuf,
    player: String,
}

impl Predictor {
    pub fn new<P: AsRef<Path>>(model_dir: P, player: &str) -> Self {
        Predictor {
            model_dir: model_dir.as_ref().to_path_buf(),
            player: player.to_string(),
        }
    }

    pub fn load(&self, target: Stat) -> Result<TrainedModel> {
        TrainedModel::load(&model_path(&self.model_dir, &self.player, target))
    }

    /// Predict each target that has a saved model; missing models are skipped
    pub fn predict(&self, games: &[GameRecord], targets: &[Stat]) -> Result<Vec<StatPrediction>> {
        let mut predictions = Vec::new();
        for target in targets {
            let model = match self.load(*target) {
                Ok(model) => model,
                Err(HoopsError::NotFound(what)) => {
                    log::warn!("No saved {} model for {}: {}", target, self.player, what);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let value = predict_next_game(&model, games)?;
            predictions.push(StatPrediction {
                target: *target,
                kind: model.kind(),
                value,
            });
        }
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::rolling::preprocess;
    use crate::training::train_model;
    use crate::{Config, Shooting, StatLine};
    use chrono::NaiveDate;

    fn season_log(n: u32) -> Vec<GameRecord> {
        (1..=n)
            .map(|d| {
                let mut stats = StatLine::new();
                stats.insert(Stat::Points, 20.0 + (d % 4) as f64);
                stats.insert(Stat::Rebounds, 7.0);
                stats.insert(Stat::Assists, 5.0 + (d % 2) as f64);
                GameRecord {
                    game_id: format!("g{}", d),
                    date: NaiveDate::from_ymd_opt(2023, 11, 1).unwrap() + chrono::Duration::days(d as i64),
                    team: "LAL".to_string(),
                    opponent: "BOS".to_string(),
                    home: d % 2 == 0,
                    matchup: "LAL vs. BOS".to_string(),
                    minutes: Some(30.0 + (d % 5) as f64),
                    stats,
                    shooting: Shooting {
                        fg_pct: Some(0.5),
                        ft_pct: Some(0.75),
                        fg3_pct: Some(0.4),
                        ..Shooting::default()
                    },
                }
            })
            .collect()
    }

    #[test]
    fn test_predict_with_saved_forest() {
        let games = season_log(40);
        let table = preprocess(&games);
        let mut config = Config::default().training;
        config.n_estimators = 5;
        let model = train_model(&table, Stat::Points, ModelKind::Forest, &config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        model.save(&model_path(dir.path(), "LeBron James", Stat::Points)).unwrap();

        let predictor = Predictor::new(dir.path(), "LeBron James");
        let predictions = predictor.predict(&games, &[Stat::Points, Stat::Rebounds]).unwrap();
        // No rebounds model saved
        assert_eq!(predictions.len(), 1);
        let value = predictions[0].value;
        assert!((20.0..=23.0).contains(&value), "got {}", value);
        assert_eq!(predictions[0].kind, ModelKind::Forest);
    }

    #[test]
    fn test_missing_feature_is_an_error() {
        let games = season_log(40);
        let mut config = Config::default().training;
        config.n_estimators = 2;
        let model = train_model(&preprocess(&games), Stat::Points, ModelKind::Forest, &config).unwrap();

        let mut bare = games.clone();
        for game in &mut bare {
            game.minutes = None;
        }
        assert!(predict_next_game(&model, &bare).is_err());
        assert!(predict_next_game(&model, &[]).is_err());
    }
}
