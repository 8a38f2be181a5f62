//! Recent-form weighting
//!
//! Weighted average over a player's most recent games, where each game is
//! weighted by its minutes relative to the player's average minutes.

use crate::{round_to, GameRecord, HoopsError, Result, Stat, StatLine};

/// Weight for games well below the player's usual minutes
pub const LOW_MINUTES_WEIGHT: f64 = 0.5;
/// Weight for games at or near the player's usual minutes
pub const NORMAL_WEIGHT: f64 = 1.0;
/// Weight for games above the player's usual minutes
pub const HIGH_MINUTES_WEIGHT: f64 = 1.5;

const LOW_MINUTES_RATIO: f64 = 0.7;
const HIGH_MINUTES_RATIO: f64 = 0.85;

/// Weighted recent-form line
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedLine {
    pub stats: StatLine,
    /// Number of games in the window
    pub games: usize,
    /// Average minutes over the full history
    pub avg_minutes: Option<f64>,
}

/// Mean of recorded minutes over the whole history
pub fn average_minutes(games: &[GameRecord]) -> Option<f64> {
    let minutes: Vec<f64> = games.iter().filter_map(|g| g.minutes).collect();
    if minutes.is_empty() {
        None
    } else {
        Some(minutes.iter().sum::<f64>() / minutes.len() as f64)
    }
}

/// Weight for a single game. Always one of 0.5, 1.0 or 1.5.
///
/// A game without recorded minutes (or a history without any) gets the
/// normal weight.
pub fn game_weight(minutes: Option<f64>, avg_minutes: Option<f64>) -> f64 {
    match (minutes, avg_minutes) {
        (Some(m), Some(avg)) if m < LOW_MINUTES_RATIO * avg => LOW_MINUTES_WEIGHT,
        (Some(m), Some(avg)) if m > HIGH_MINUTES_RATIO * avg => HIGH_MINUTES_WEIGHT,
        _ => NORMAL_WEIGHT,
    }
}

/// Weighted average of each stat over the last `window` games.
///
/// `games` must be ordered by date ascending. Average minutes come from the
/// full history, not just the window. Missing values are dropped per stat,
/// and a stat missing from every game in the window is left out.
pub fn weighted_average(games: &[GameRecord], window: usize) -> Result<WeightedLine> {
    if window == 0 || games.is_empty() {
        return Err(HoopsError::EmptyWindow);
    }

    let avg_minutes = average_minutes(games);
    let recent = &games[games.len().saturating_sub(window)..];

    let mut stats = StatLine::new();
    for stat in Stat::ALL {
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for game in recent {
            if let Some(value) = game.stats.get(stat) {
                let weight = game_weight(game.minutes, avg_minutes);
                weighted_sum += value * weight;
                weight_sum += weight;
            }
        }
        if weight_sum > 0.0 {
            stats.insert(stat, round_to(weighted_sum / weight_sum, 1));
        }
    }

    log::debug!(
        "Weighted {} of {} games (avg minutes {:?})",
        recent.len(),
        games.len(),
        avg_minutes
    );

    Ok(WeightedLine {
        stats,
        games: recent.len(),
        avg_minutes,
    })
}
