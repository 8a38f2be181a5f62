//! Projection pipeline
//!
//! Runs one analysis request: weight the player's recent games, profile the
//! opponent, estimate the position matchup delta and compose the final line.
//! Only the player's own game log is required; opponent and matchup steps
//! degrade to "no adjustment" when their data is unavailable.

use crate::data::StatsSource;
use crate::features::matchup::{estimate_matchup_delta, MatchupDelta};
use crate::features::projection::{compose, ProjectedLine};
use crate::features::rankings::{opponent_profile, OpponentProfile, RankingsCache};
use crate::features::weighting::{weighted_average, WeightedLine};
use crate::selection::{match_players, Selection};
use crate::{GameRecord, HoopsError, Player, Position, Result, Season, Team};

/// Result of a single projection request
#[derive(Debug, Clone)]
pub struct Analysis {
    pub player: Player,
    pub season: Season,
    /// Games requested for the weighting window
    pub window: usize,
    pub base: WeightedLine,
    pub opponent: Option<Team>,
    pub opponent_profile: Option<OpponentProfile>,
    pub position: Option<Position>,
    /// Present when an opponent and position were both known
    pub matchup: Option<MatchupDelta>,
    pub projection: ProjectedLine,
}

impl Analysis {
    /// True if matchup deltas were applied to the base line
    pub fn is_adjusted(&self) -> bool {
        self.matchup.is_some()
    }
}

/// Search active players of `season` by name
pub fn find_player<S: StatsSource + ?Sized>(
    source: &S,
    season: &Season,
    query: &str,
    max_candidates: usize,
) -> Result<Selection<Player>> {
    let players = source.active_players(season)?;
    Ok(match_players(&players, query, max_candidates))
}

/// The player's season game log; an empty log is reported as `NoGames`
pub fn player_games<S: StatsSource + ?Sized>(
    source: &S,
    player: &Player,
    season: &Season,
) -> Result<Vec<GameRecord>> {
    let games = source.player_game_log(player.id, season)?;
    if games.is_empty() {
        return Err(HoopsError::NoGames {
            player: player.name.clone(),
            season: season.clone(),
        });
    }
    log::info!("Fetched {} games for {} ({})", games.len(), player.name, season);
    Ok(games)
}

fn resolve_position<S: StatsSource + ?Sized>(source: &S, player: &Player) -> Option<Position> {
    if player.position.is_some() {
        return player.position;
    }
    match source.player_position(player.id) {
        Ok(position) => position,
        Err(e) => {
            log::warn!("Error fetching position for {}: {}", player.name, e);
            None
        }
    }
}

/// Project the player's next line against `opponent`.
///
/// `games` must be the player's season log, ordered by date ascending.
pub fn project<S: StatsSource + ?Sized>(
    source: &S,
    rankings: &mut RankingsCache,
    player: &Player,
    games: &[GameRecord],
    opponent: Option<&Team>,
    season: &Season,
    window: usize,
) -> Result<Analysis> {
    let base = weighted_average(games, window)?;

    let mut profile = None;
    let mut position = None;
    let mut matchup = None;

    if let Some(team) = opponent {
        profile = match rankings.get_or_compute(source, season) {
            Ok(league) => match opponent_profile(source, team, league, season, window) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("Could not fetch opponent team stats for {}: {}", team.abbreviation, e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to fetch league team rankings: {}", e);
                None
            }
        };

        position = resolve_position(source, player);
        match position {
            Some(pos) => match estimate_matchup_delta(source, team, pos, season) {
                Ok(delta) => matchup = Some(delta),
                Err(e) => log::warn!("Could not estimate matchup deltas: {}", e),
            },
            None => log::warn!("Could not determine position for {}", player.name),
        }
    } else {
        log::info!("No opponent selected, projecting from recent form only");
    }

    let projection = match &matchup {
        Some(delta) => compose(&base.stats, &delta.deltas),
        None => ProjectedLine::new(&base.stats),
    };

    Ok(Analysis {
        player: player.clone(),
        season: season.clone(),
        window,
        base,
        opponent: opponent.cloned(),
        opponent_profile: profile,
        position,
        matchup,
        projection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemorySource;
    use crate::{PlayerId, Shooting, Stat, StatLine, TeamGameRecord};
    use chrono::NaiveDate;

    fn season() -> Season {
        Season::parse("2023-24").unwrap()
    }

    fn game(day: u32, opponent: &str, points: f64, minutes: f64) -> GameRecord {
        let mut stats = StatLine::new();
        stats.insert(Stat::Points, points);
        stats.insert(Stat::Rebounds, 8.0);
        stats.insert(Stat::Assists, 6.0);
        GameRecord {
            game_id: format!("g{}", day),
            date: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
            team: "LAL".to_string(),
            opponent: opponent.to_string(),
            home: false,
            matchup: format!("LAL @ {}", opponent),
            minutes: Some(minutes),
            stats,
            shooting: Shooting::default(),
        }
    }

    fn team_game(source: &InMemorySource, abbr: &str, day: u32, points: f64) -> TeamGameRecord {
        let team = source.team_by_abbreviation(abbr).unwrap();
        let mut stats = StatLine::new();
        stats.insert(Stat::Points, points);
        TeamGameRecord {
            team_id: team.id,
            team_abbreviation: team.abbreviation,
            game_id: format!("{}{}", abbr, day),
            date: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
            matchup: String::new(),
            stats,
        }
    }

    fn setup() -> (InMemorySource, Player) {
        let mut source = InMemorySource::new();
        let star = Player {
            id: PlayerId(2544),
            name: "LeBron James".to_string(),
            position: Some(Position::Forward),
        };
        source.add_player(star.clone());
        source.add_game_log(
            star.id,
            season(),
            vec![
                game(1, "BOS", 30.0, 36.0),
                game(2, "MIA", 24.0, 36.0),
                game(3, "DEN", 26.0, 36.0),
            ],
        );

        let peer = Player {
            id: PlayerId(1),
            name: "Peer Forward".to_string(),
            position: Some(Position::Forward),
        };
        source.add_player(peer.clone());
        source.add_game_log(
            peer.id,
            season(),
            vec![game(1, "BOS", 20.0, 30.0), game(2, "MIA", 10.0, 30.0)],
        );

        let logs = vec![
            team_game(&source, "BOS", 1, 120.0),
            team_game(&source, "BOS", 2, 110.0),
            team_game(&source, "MIA", 1, 100.0),
        ];
        source.add_team_logs(season(), logs);
        (source, star)
    }

    #[test]
    fn test_projection_with_matchup() {
        let (source, star) = setup();
        let games = player_games(&source, &star, &season()).unwrap();
        let bos = source.team_by_abbreviation("BOS").unwrap();
        let mut cache = RankingsCache::new();

        let analysis = project(&source, &mut cache, &star, &games, Some(&bos), &season(), 5).unwrap();

        // Equal minutes: plain mean of 30, 24, 26
        assert_eq!(analysis.base.stats.get(Stat::Points), Some(26.7));
        let matchup = analysis.matchup.as_ref().unwrap();
        // Star: 30 - 26.67, peer: 20 - 15
        assert_eq!(matchup.contributors, 2);
        assert_eq!(matchup.get(Stat::Points), Some(4.17));
        assert_eq!(analysis.projection.get(Stat::Points), Some(30.9));
        assert_eq!(analysis.projection.get(Stat::Rebounds), Some(8.0));

        let profile = analysis.opponent_profile.as_ref().unwrap();
        assert_eq!(profile.averages.get(Stat::Points), Some(115.0));
        assert_eq!(profile.ranks[&Stat::Points], Some(1));
        assert!(analysis.is_adjusted());
    }

    #[test]
    fn test_projection_without_opponent() {
        let (source, star) = setup();
        let games = player_games(&source, &star, &season()).unwrap();
        let mut cache = RankingsCache::new();

        let analysis = project(&source, &mut cache, &star, &games, None, &season(), 2).unwrap();
        assert!(!analysis.is_adjusted());
        // Last two games: 24 and 26
        assert_eq!(analysis.projection.get(Stat::Points), Some(25.0));
        assert!(analysis.opponent_profile.is_none());
    }

    #[test]
    fn test_no_games_reported() {
        let (source, _) = setup();
        let rookie = Player {
            id: PlayerId(99),
            name: "Rookie".to_string(),
            position: None,
        };
        let err = player_games(&source, &rookie, &season()).unwrap_err();
        assert!(matches!(err, HoopsError::NoGames { .. }));
        assert!(err.to_string().contains("2023-24"));
    }

    #[test]
    fn test_find_player() {
        let (source, _) = setup();
        let selection = find_player(&source, &season(), "lebron", 12).unwrap();
        assert!(matches!(selection, Selection::Unique(p) if p.id == PlayerId(2544)));
    }

    #[test]
    fn test_missing_position_skips_adjustment() {
        let (mut source, _) = setup();
        let unknown = Player {
            id: PlayerId(7),
            name: "Unknown Role".to_string(),
            position: None,
        };
        source.add_player(unknown.clone());
        source.add_game_log(unknown.id, season(), vec![game(1, "BOS", 12.0, 20.0)]);

        let games = player_games(&source, &unknown, &season()).unwrap();
        let bos = source.team_by_abbreviation("BOS").unwrap();
        let mut cache = RankingsCache::new();
        let analysis = project(&source, &mut cache, &unknown, &games, Some(&bos), &season(), 5).unwrap();

        assert!(analysis.position.is_none());
        assert!(!analysis.is_adjusted());
        assert_eq!(analysis.projection.get(Stat::Points), Some(12.0));
    }
}
