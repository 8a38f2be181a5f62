//! Stats provider contract

use crate::{GameRecord, HoopsError, Player, PlayerId, Position, Result, Season, Team, TeamGameRecord, TeamId};

/// Trait for all stats providers
///
/// Every call may fail; callers decide whether a failure aborts the
/// current request or only skips one entity.
pub trait StatsSource {
    /// Season game log for a player, ordered by date ascending
    fn player_game_log(&self, player: PlayerId, season: &Season) -> Result<Vec<GameRecord>>;

    /// League-wide team game logs, optionally restricted to one team
    fn team_game_logs(&self, season: &Season, team: Option<TeamId>) -> Result<Vec<TeamGameRecord>>;

    /// Standardized position for a player, if one is recorded
    fn player_position(&self, player: PlayerId) -> Result<Option<Position>>;

    /// Players active in the given season
    fn active_players(&self, season: &Season) -> Result<Vec<Player>>;

    /// All franchises
    fn teams(&self) -> Result<Vec<Team>>;

    fn team_by_id(&self, id: TeamId) -> Result<Team> {
        self.teams()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| HoopsError::NotFound(format!("team with ID {}", id.0)))
    }

    fn team_by_abbreviation(&self, abbreviation: &str) -> Result<Team> {
        self.teams()?
            .into_iter()
            .find(|t| t.abbreviation.eq_ignore_ascii_case(abbreviation.trim()))
            .ok_or_else(|| HoopsError::NotFound(format!("team '{}'", abbreviation)))
    }
}

/// Delay before retry number `attempt`, doubling from 100ms and capped at 30s
pub fn backoff_millis(attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(MAX_BACKOFF_MILLIS, |factor| factor.saturating_mul(100))
        .min(MAX_BACKOFF_MILLIS)
}

const MAX_BACKOFF_MILLIS: u64 = 30_000;

/// Retry an operation with exponential backoff
pub fn with_retry<T, F>(mut operation: F, max_attempts: u32) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                log::warn!("Attempt {} failed: {}", attempt, e);
                if attempt >= max_attempts {
                    return Err(e);
                }
                let delay = std::time::Duration::from_millis(backoff_millis(attempt));
                std::thread::sleep(delay);
            }
        }
    }
}
