//! Rolling-average features for the regression models
//!
//! Each row describes a game using only the games before it: the mean of
//! the previous 5 and 10 games for points, rebounds and assists, plus the
//! game's minutes and shooting percentages.

use crate::{GameRecord, HoopsError, Result, Stat, StatLine};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;

/// Rolling windows, in games
pub const WINDOWS: [usize; 2] = [5, 10];

/// Stats that get rolling averages
pub const ROLLING_STATS: [Stat; 3] = [Stat::Points, Stat::Rebounds, Stat::Assists];

/// Per-game columns used as-is
pub const GAME_COLUMNS: [&str; 4] = ["MIN", "FG_PCT", "FT_PCT", "FG3_PCT"];

/// Column name for a rolling average, e.g. `LAST_5_GAME_AVG_PTS`
pub fn rolling_column(window: usize, stat: Stat) -> String {
    format!("LAST_{}_GAME_AVG_{}", window, stat.code())
}

/// All feature column names in canonical order
pub fn feature_columns() -> Vec<String> {
    let mut columns = Vec::new();
    for window in WINDOWS {
        for stat in ROLLING_STATS {
            columns.push(rolling_column(window, stat));
        }
    }
    columns.extend(GAME_COLUMNS.iter().map(|c| c.to_string()));
    columns
}

fn game_column(game: &GameRecord, column: &str) -> Option<f64> {
    match column {
        "MIN" => game.minutes,
        "FG_PCT" => game.shooting.fg_pct,
        "FT_PCT" => game.shooting.ft_pct,
        "FG3_PCT" => game.shooting.fg3_pct,
        _ => None,
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Fill missing stat, minutes and percentage values with the column median.
///
/// Columns with no recorded value at all stay missing.
pub fn fill_missing_with_median(games: &mut [GameRecord]) {
    for stat in Stat::ALL {
        let mut present: Vec<f64> = games.iter().filter_map(|g| g.stats.get(stat)).collect();
        if let Some(m) = median(&mut present) {
            for game in games.iter_mut().filter(|g| !g.stats.contains(stat)) {
                game.stats.insert(stat, m);
            }
        }
    }

    for column in GAME_COLUMNS {
        let mut present: Vec<f64> = games.iter().filter_map(|g| game_column(g, column)).collect();
        let Some(m) = median(&mut present) else {
            continue;
        };
        for game in games.iter_mut() {
            let slot = match column {
                "MIN" => &mut game.minutes,
                "FG_PCT" => &mut game.shooting.fg_pct,
                "FT_PCT" => &mut game.shooting.ft_pct,
                _ => &mut game.shooting.fg3_pct,
            };
            if slot.is_none() {
                *slot = Some(m);
            }
        }
    }
}

/// Mean of the `window` values strictly before `index`.
///
/// `None` until a full window of prior games exists or when any of them is
/// missing.
pub fn rolling_mean_before(values: &[Option<f64>], index: usize, window: usize) -> Option<f64> {
    if window == 0 || index < window {
        return None;
    }
    let mut sum = 0.0;
    for value in &values[index - window..index] {
        sum += (*value)?;
    }
    Some(sum / window as f64)
}

/// One training example
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub game_id: String,
    pub date: NaiveDate,
    /// Values in `FeatureTable::columns` order
    pub features: Vec<f64>,
    pub targets: StatLine,
}

/// Feature matrix plus per-stat targets
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep only the named columns, in the given order
    pub fn select(&self, columns: &[String]) -> Result<FeatureTable> {
        let indices = columns
            .iter()
            .map(|c| {
                self.columns
                    .iter()
                    .position(|existing| existing == c)
                    .ok_or_else(|| HoopsError::NotFound(format!("feature column '{}'", c)))
            })
            .collect::<Result<Vec<usize>>>()?;

        Ok(FeatureTable {
            columns: columns.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| FeatureRow {
                    features: indices.iter().map(|i| row.features[*i]).collect(),
                    ..row.clone()
                })
                .collect(),
        })
    }

    /// Feature rows and targets for rows where `target` is recorded
    pub fn xy(&self, target: Stat) -> (Vec<Vec<f64>>, Vec<f64>) {
        self.rows
            .iter()
            .filter_map(|row| row.targets.get(target).map(|y| (row.features.clone(), y)))
            .unzip()
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["GAME_ID".to_string(), "GAME_DATE".to_string()];
        header.extend(self.columns.iter().cloned());
        header.extend(Stat::ALL.iter().map(|s| s.code().to_string()));
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.game_id.clone(), row.date.format("%Y-%m-%d").to_string()];
            record.extend(row.features.iter().map(|v| v.to_string()));
            record.extend(
                Stat::ALL
                    .iter()
                    .map(|s| row.targets.get(*s).map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<FeatureTable> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let headers = reader.headers()?.clone();

        let index_of = |name: &str| headers.iter().position(|h| h == name);
        let game_id_idx = index_of("GAME_ID")
            .ok_or_else(|| HoopsError::Parse("feature file has no GAME_ID column".to_string()))?;
        let date_idx = index_of("GAME_DATE")
            .ok_or_else(|| HoopsError::Parse("feature file has no GAME_DATE column".to_string()))?;

        let target_idx: HashMap<Stat, usize> = Stat::ALL
            .iter()
            .filter_map(|s| index_of(s.code()).map(|i| (*s, i)))
            .collect();
        let feature_idx: Vec<(String, usize)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != game_id_idx && *i != date_idx && !target_idx.values().any(|t| t == i))
            .map(|(i, h)| (h.to_string(), i))
            .collect();

        let parse_number = |raw: &str, column: &str| -> Result<f64> {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| HoopsError::Parse(format!("bad value '{}' in column {}", raw, column)))
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or("");

            let date = NaiveDate::parse_from_str(field(date_idx), "%Y-%m-%d")
                .map_err(|e| HoopsError::Parse(format!("bad GAME_DATE '{}': {}", field(date_idx), e)))?;
            let features = feature_idx
                .iter()
                .map(|(name, i)| parse_number(field(*i), name))
                .collect::<Result<Vec<f64>>>()?;

            let mut targets = StatLine::new();
            for (stat, i) in &target_idx {
                if !field(*i).trim().is_empty() {
                    targets.insert(*stat, parse_number(field(*i), stat.code())?);
                }
            }

            rows.push(FeatureRow {
                game_id: field(game_id_idx).to_string(),
                date,
                features,
                targets,
            });
        }

        Ok(FeatureTable {
            columns: feature_idx.into_iter().map(|(name, _)| name).collect(),
            rows,
        })
    }
}

/// Build the feature table from a game log.
///
/// Missing values are filled with column medians first; games without a
/// full 10-game history are dropped.
pub fn preprocess(games: &[GameRecord]) -> FeatureTable {
    let mut games = games.to_vec();
    fill_missing_with_median(&mut games);
    games.sort_by_key(|g| g.date);

    let series: HashMap<Stat, Vec<Option<f64>>> = ROLLING_STATS
        .iter()
        .map(|s| (*s, games.iter().map(|g| g.stats.get(*s)).collect()))
        .collect();

    let columns = feature_columns();
    let mut rows = Vec::new();
    for (index, game) in games.iter().enumerate() {
        let mut features = Vec::with_capacity(columns.len());
        for window in WINDOWS {
            for stat in ROLLING_STATS {
                features.push(rolling_mean_before(&series[&stat], index, window));
            }
        }
        for column in GAME_COLUMNS {
            features.push(game_column(game, column));
        }

        if let Some(features) = features.into_iter().collect::<Option<Vec<f64>>>() {
            rows.push(FeatureRow {
                game_id: game.game_id.clone(),
                date: game.date,
                features,
                targets: game.stats.clone(),
            });
        }
    }

    log::info!("Built {} feature rows from {} games", rows.len(), games.len());
    FeatureTable { columns, rows }
}

fn tail_mean(games: &[GameRecord], stat: Stat, window: usize) -> Option<f64> {
    let tail = &games[games.len().saturating_sub(window)..];
    let values: Vec<f64> = tail.iter().filter_map(|g| g.stats.get(stat)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Features describing the next, unplayed game.
///
/// Rolling averages cover the most recent games (the last game included);
/// minutes and percentages come from the last game played.
pub fn next_game_features(games: &[GameRecord]) -> Result<HashMap<String, f64>> {
    let last = games
        .last()
        .ok_or_else(|| HoopsError::Model("no games to build features from".to_string()))?;

    let mut features = HashMap::new();
    for window in WINDOWS {
        for stat in ROLLING_STATS {
            if let Some(value) = tail_mean(games, stat, window) {
                features.insert(rolling_column(window, stat), value);
            }
        }
    }
    for column in GAME_COLUMNS {
        if let Some(value) = game_column(last, column) {
            features.insert(column.to_string(), value);
        }
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shooting;

    fn make_game(day: u32, points: Option<f64>, minutes: Option<f64>) -> GameRecord {
        let mut stats = StatLine::new();
        if let Some(p) = points {
            stats.insert(Stat::Points, p);
        }
        stats.insert(Stat::Rebounds, 6.0);
        stats.insert(Stat::Assists, 4.0);
        GameRecord {
            game_id: format!("g{:02}", day),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            team: "LAL".to_string(),
            opponent: "BOS".to_string(),
            home: true,
            matchup: "LAL vs. BOS".to_string(),
            minutes,
            stats,
            shooting: Shooting {
                fg_pct: Some(0.5),
                ft_pct: Some(0.8),
                fg3_pct: Some(0.35),
                ..Shooting::default()
            },
        }
    }

    fn season(n: u32) -> Vec<GameRecord> {
        (1..=n)
            .map(|d| make_game(d, Some(d as f64), Some(30.0)))
            .collect()
    }

    #[test]
    fn test_rolling_mean_uses_previous_games_only() {
        let values: Vec<Option<f64>> = (1..=6).map(|v| Some(v as f64)).collect();
        assert_eq!(rolling_mean_before(&values, 4, 5), None);
        // Values 1..=5 precede index 5
        assert_eq!(rolling_mean_before(&values, 5, 5), Some(3.0));
        assert_eq!(rolling_mean_before(&[Some(1.0), None, Some(3.0)], 3, 3), None);
    }

    #[test]
    fn test_preprocess_drops_incomplete_windows() {
        let table = preprocess(&season(12));
        // Rows start once 10 prior games exist
        assert_eq!(table.len(), 2);
        assert_eq!(table.columns, feature_columns());

        let first = &table.rows[0];
        assert_eq!(first.game_id, "g11");
        let last5 = table.columns.iter().position(|c| c == "LAST_5_GAME_AVG_PTS").unwrap();
        let last10 = table.columns.iter().position(|c| c == "LAST_10_GAME_AVG_PTS").unwrap();
        // Games 6..=10 and 1..=10
        assert_eq!(first.features[last5], 8.0);
        assert_eq!(first.features[last10], 5.5);
        assert_eq!(first.targets.get(Stat::Points), Some(11.0));
    }

    #[test]
    fn test_missing_values_filled_with_median() {
        let mut games = vec![
            make_game(1, Some(10.0), Some(30.0)),
            make_game(2, None, None),
            make_game(3, Some(20.0), Some(34.0)),
            make_game(4, Some(40.0), Some(20.0)),
        ];
        fill_missing_with_median(&mut games);
        assert_eq!(games[1].stats.get(Stat::Points), Some(20.0));
        assert_eq!(games[1].minutes, Some(30.0));
        // Never recorded: stays missing
        assert!(!games[1].stats.contains(Stat::Steals));
    }

    #[test]
    fn test_select_columns() {
        let table = preprocess(&season(11));
        let only = table.select(&["LAST_5_GAME_AVG_PTS".to_string()]).unwrap();
        assert_eq!(only.columns.len(), 1);
        assert_eq!(only.rows[0].features, vec![8.0]);
        assert!(table.select(&["NOPE".to_string()]).is_err());
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        let table = preprocess(&season(13));
        table.write_csv(&path).unwrap();

        let loaded = FeatureTable::read_csv(&path).unwrap();
        assert_eq!(loaded.columns, table.columns);
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.rows[2].targets.get(Stat::Points), Some(13.0));
        let (x, y) = loaded.xy(Stat::Points);
        assert_eq!(x.len(), 3);
        assert_eq!(y, vec![11.0, 12.0, 13.0]);
    }

    #[test]
    fn test_next_game_features() {
        let features = next_game_features(&season(12)).unwrap();
        // Games 8..=12
        assert_eq!(features["LAST_5_GAME_AVG_PTS"], 10.0);
        // Games 3..=12
        assert_eq!(features["LAST_10_GAME_AVG_PTS"], 7.5);
        assert_eq!(features["MIN"], 30.0);
        assert_eq!(features["FT_PCT"], 0.8);
        assert!(next_game_features(&[]).is_err());
    }
}
