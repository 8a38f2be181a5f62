//! Basketball stat projections
//!
//! Fetches player and team game logs from the NBA stats API, weights a
//! player's recent form by playing time, adjusts it by how same-position
//! players fare against the opponent, and fits small regression models
//! over rolling-average features.

pub mod data;
pub mod features;
pub mod predict;
pub mod selection;
pub mod training;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Unique identifier for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player({})", self.0)
    }
}

/// Unique identifier for a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

/// Counting statistics tracked per game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stat {
    Points,
    Rebounds,
    Assists,
    Steals,
    Blocks,
}

impl Stat {
    pub const ALL: [Stat; 5] = [
        Stat::Points,
        Stat::Rebounds,
        Stat::Assists,
        Stat::Steals,
        Stat::Blocks,
    ];

    /// Column code used by the stats API
    pub fn code(&self) -> &'static str {
        match self {
            Stat::Points => "PTS",
            Stat::Rebounds => "REB",
            Stat::Assists => "AST",
            Stat::Steals => "STL",
            Stat::Blocks => "BLK",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "PTS" => Some(Stat::Points),
            "REB" => Some(Stat::Rebounds),
            "AST" => Some(Stat::Assists),
            "STL" => Some(Stat::Steals),
            "BLK" => Some(Stat::Blocks),
            _ => None,
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Stat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Stat::from_code(s).ok_or_else(|| format!("Unknown stat: {}. Use PTS, REB, AST, STL or BLK.", s))
    }
}

/// Per-stat values for a single game or an aggregate.
///
/// A stat missing from the line means the value was not recorded; it is
/// never implicitly zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatLine(BTreeMap<Stat, f64>);

impl StatLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// A line with every tracked stat set to zero
    pub fn zeros() -> Self {
        Stat::ALL.iter().map(|s| (*s, 0.0)).collect()
    }

    pub fn get(&self, stat: Stat) -> Option<f64> {
        self.0.get(&stat).copied()
    }

    /// Insert a value, ignoring NaN and infinities
    pub fn insert(&mut self, stat: Stat, value: f64) {
        if value.is_finite() {
            self.0.insert(stat, value);
        }
    }

    pub fn contains(&self, stat: Stat) -> bool {
        self.0.contains_key(&stat)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stat, f64)> + '_ {
        self.0.iter().map(|(s, v)| (*s, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Round every value to the given number of decimal places
    pub fn rounded(&self, places: u32) -> Self {
        self.iter().map(|(s, v)| (s, round_to(v, places))).collect()
    }
}

impl FromIterator<(Stat, f64)> for StatLine {
    fn from_iter<I: IntoIterator<Item = (Stat, f64)>>(iter: I) -> Self {
        let mut line = StatLine::new();
        for (stat, value) in iter {
            line.insert(stat, value);
        }
        line
    }
}

/// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Standardized playing position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    PointGuard,
    ShootingGuard,
    Guard,
    SmallForward,
    PowerForward,
    Forward,
    Center,
}

impl Position {
    pub fn code(&self) -> &'static str {
        match self {
            Position::PointGuard => "PG",
            Position::ShootingGuard => "SG",
            Position::Guard => "G",
            Position::SmallForward => "SF",
            Position::PowerForward => "PF",
            Position::Forward => "F",
            Position::Center => "C",
        }
    }

    /// Parse a position from a code or a full name.
    ///
    /// Combined positions ("Guard-Forward", "F-C") resolve to their
    /// primary component.
    pub fn parse(raw: &str) -> Option<Self> {
        let primary = raw.split('-').next()?.trim();
        match primary.to_lowercase().as_str() {
            "pg" | "point guard" => Some(Position::PointGuard),
            "sg" | "shooting guard" => Some(Position::ShootingGuard),
            "g" | "guard" => Some(Position::Guard),
            "sf" | "small forward" | "shooting forward" => Some(Position::SmallForward),
            "pf" | "power forward" => Some(Position::PowerForward),
            "f" | "forward" => Some(Position::Forward),
            "c" | "center" => Some(Position::Center),
            _ => None,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Season label in the API's `YYYY-YY` form, e.g. `2023-24`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct Season(String);

impl TryFrom<String> for Season {
    type Error = HoopsError;

    fn try_from(label: String) -> Result<Self> {
        Season::parse(&label)
    }
}

impl Season {
    pub fn parse(label: &str) -> Result<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^(\d{4})-(\d{2})$").expect("season pattern is valid")
        });

        let label = label.trim();
        let caps = pattern
            .captures(label)
            .ok_or_else(|| HoopsError::Parse(format!("Invalid season '{}', expected YYYY-YY", label)))?;
        let start: u32 = caps[1]
            .parse()
            .map_err(|_| HoopsError::Parse(format!("Invalid season '{}'", label)))?;
        let end: u32 = caps[2]
            .parse()
            .map_err(|_| HoopsError::Parse(format!("Invalid season '{}'", label)))?;
        if (start + 1) % 100 != end {
            return Err(HoopsError::Parse(format!(
                "Invalid season '{}': years are not consecutive",
                label
            )));
        }
        Ok(Season(label.to_string()))
    }

    /// Season starting in the given calendar year
    pub fn from_start_year(year: u16) -> Self {
        Season(format!("{}-{:02}", year, (year + 1) % 100))
    }

    pub fn start_year(&self) -> u16 {
        self.0.get(..4).and_then(|y| y.parse().ok()).unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Season {
    type Err = HoopsError;

    fn from_str(s: &str) -> Result<Self> {
        Season::parse(s)
    }
}

/// An active player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Option<Position>,
}

/// An NBA franchise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub abbreviation: String,
    pub full_name: String,
}

impl Team {
    pub fn matches_name(&self, name: &str) -> bool {
        let name_lower = name.trim().to_lowercase();
        self.abbreviation.to_lowercase() == name_lower || self.full_name.to_lowercase() == name_lower
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.full_name, self.abbreviation)
    }
}

/// Parsed form of a matchup string such as `LAL @ GSW` or `LAL vs. GSW`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matchup {
    pub team: String,
    pub opponent: String,
    pub home: bool,
}

impl Matchup {
    pub fn parse(raw: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^\s*(\S+)\s+(@|vs\.)\s+(.+?)\s*$").expect("matchup pattern is valid")
        });

        let caps = pattern.captures(raw)?;
        Some(Matchup {
            team: caps[1].to_string(),
            opponent: caps[3].to_string(),
            home: &caps[2] == "vs.",
        })
    }

    /// True if a matchup string names `opponent` in road or home form
    pub fn mentions(raw: &str, opponent: &str) -> bool {
        raw.contains(&format!("@ {}", opponent)) || raw.contains(&format!("vs. {}", opponent))
    }
}

/// Shooting detail kept for regression features
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shooting {
    pub fgm: Option<f64>,
    pub fga: Option<f64>,
    pub fg_pct: Option<f64>,
    pub fg3a: Option<f64>,
    pub fg3_pct: Option<f64>,
    pub ft_pct: Option<f64>,
}

/// A single player game from a game log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub date: NaiveDate,
    /// Abbreviation of the player's team
    pub team: String,
    /// Abbreviation of the opponent, derived from the matchup
    pub opponent: String,
    pub home: bool,
    pub matchup: String,
    pub minutes: Option<f64>,
    pub stats: StatLine,
    pub shooting: Shooting,
}

impl GameRecord {
    /// Check if this game was played against the given team
    pub fn faces(&self, team: &Team) -> bool {
        Matchup::mentions(&self.matchup, &team.abbreviation)
            || Matchup::mentions(&self.matchup, &team.full_name)
    }
}

/// A single team game from the league-wide team logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamGameRecord {
    pub team_id: TeamId,
    pub team_abbreviation: String,
    pub game_id: String,
    pub date: NaiveDate,
    pub matchup: String,
    pub stats: StatLine,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum HoopsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Stats API request to {endpoint} failed: {message}")]
    Fetch { endpoint: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No game logs found for {player} in the {season} season")]
    NoGames { player: String, season: Season },

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Cannot weight an empty window of games")]
    EmptyWindow,

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, HoopsError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub projection: ProjectionConfig,
    pub training: TrainingConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Directory for cached JSON responses
    pub cache_dir: Option<String>,
    /// Serve requests from the cache only
    pub offline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub season: String,
    pub season_type: String,
    pub games: usize,
    pub max_candidates: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub test_ratio: f64,
    pub seed: u64,
    pub epochs: usize,
    pub learning_rate: f64,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub data_dir: String,
    pub model_dir: String,
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig {
                base_url: "https://stats.nba.com/stats".to_string(),
                timeout_secs: 30,
                max_attempts: 3,
                cache_dir: None,
                offline: false,
            },
            projection: ProjectionConfig {
                season: "2023-24".to_string(),
                season_type: "Regular Season".to_string(),
                games: 5,
                max_candidates: 12,
            },
            training: TrainingConfig {
                test_ratio: 0.2,
                seed: 42,
                epochs: 500,
                learning_rate: 0.1,
                n_estimators: 100,
                max_depth: None,
                min_samples_split: 2,
            },
            data: DataConfig {
                data_dir: "data".to_string(),
                model_dir: "models".to_string(),
                output_dir: ".".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HoopsError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| HoopsError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HoopsError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Configured default season
    pub fn season(&self) -> Result<Season> {
        Season::parse(&self.projection.season)
            .map_err(|e| HoopsError::Config(format!("projection.season: {}", e)))
    }
}
