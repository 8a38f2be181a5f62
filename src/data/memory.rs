//! In-memory stats provider
//!
//! Serves pre-loaded records, e.g. game logs read back from CSV or fixtures
//! built in tests. Individual players can be marked as failing to exercise
//! partial-failure paths.

use super::source::StatsSource;
use super::teams::nba_teams;
use crate::{
    GameRecord, HoopsError, Player, PlayerId, Position, Result, Season, Team, TeamGameRecord,
    TeamId,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct InMemorySource {
    players: Vec<Player>,
    teams: Vec<Team>,
    game_logs: HashMap<(PlayerId, Season), Vec<GameRecord>>,
    team_logs: HashMap<Season, Vec<TeamGameRecord>>,
    failing: HashSet<PlayerId>,
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySource {
    /// Empty source with the standard franchise table
    pub fn new() -> Self {
        InMemorySource {
            players: Vec::new(),
            teams: nba_teams(),
            game_logs: HashMap::new(),
            team_logs: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn add_player(&mut self, player: Player) {
        self.players.push(player);
    }

    /// Store a game log, keeping it ordered by date ascending
    pub fn add_game_log(&mut self, player: PlayerId, season: Season, mut games: Vec<GameRecord>) {
        games.sort_by_key(|g| g.date);
        self.game_logs.insert((player, season), games);
    }

    pub fn add_team_logs(&mut self, season: Season, logs: Vec<TeamGameRecord>) {
        self.team_logs.entry(season).or_default().extend(logs);
    }

    /// Make every fetch for this player fail
    pub fn fail_player(&mut self, player: PlayerId) {
        self.failing.insert(player);
    }
}

impl StatsSource for InMemorySource {
    fn player_game_log(&self, player: PlayerId, season: &Season) -> Result<Vec<GameRecord>> {
        if self.failing.contains(&player) {
            return Err(HoopsError::Fetch {
                endpoint: "playergamelog".to_string(),
                message: format!("simulated failure for {}", player),
            });
        }
        Ok(self
            .game_logs
            .get(&(player, season.clone()))
            .cloned()
            .unwrap_or_default())
    }

    fn team_game_logs(&self, season: &Season, team: Option<TeamId>) -> Result<Vec<TeamGameRecord>> {
        let logs = self.team_logs.get(season).cloned().unwrap_or_default();
        Ok(match team {
            Some(id) => logs.into_iter().filter(|r| r.team_id == id).collect(),
            None => logs,
        })
    }

    fn player_position(&self, player: PlayerId) -> Result<Option<Position>> {
        if self.failing.contains(&player) {
            return Err(HoopsError::Fetch {
                endpoint: "commonplayerinfo".to_string(),
                message: format!("simulated failure for {}", player),
            });
        }
        Ok(self
            .players
            .iter()
            .find(|p| p.id == player)
            .and_then(|p| p.position))
    }

    fn active_players(&self, _season: &Season) -> Result<Vec<Player>> {
        Ok(self.players.clone())
    }

    fn teams(&self) -> Result<Vec<Team>> {
        Ok(self.teams.clone())
    }
}
