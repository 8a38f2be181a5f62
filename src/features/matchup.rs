//! Opponent matchup deltas
//!
//! How much players at a position deviate from their season averages when
//! they face a given opponent. Each player's game log is a separate fetch;
//! a failed fetch only removes that player from the sample.

use super::rankings::mean_line;
use crate::data::StatsSource;
use crate::{round_to, GameRecord, Player, Position, Result, Season, Stat, StatLine, Team};
use std::collections::BTreeMap;

/// Averaged per-stat deltas for a position cohort against one opponent
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupDelta {
    /// Signed delta per stat, rounded to 2 decimals. Zero when no player contributed.
    pub deltas: StatLine,
    /// Players with at least one game against the opponent
    pub contributors: usize,
    /// Players without a qualifying game
    pub skipped: usize,
    /// Players whose game log could not be fetched
    pub failed: usize,
}

impl MatchupDelta {
    /// Delta with no information: every stat zero
    pub fn neutral() -> Self {
        MatchupDelta {
            deltas: StatLine::zeros(),
            contributors: 0,
            skipped: 0,
            failed: 0,
        }
    }

    /// True if at least one player contributed
    pub fn is_informative(&self) -> bool {
        self.contributors > 0
    }

    pub fn get(&self, stat: Stat) -> Option<f64> {
        self.deltas.get(stat)
    }
}

/// Outcome of one player's delta computation
#[derive(Debug)]
pub struct PlayerDelta {
    pub player: Player,
    /// `Ok(None)` when the player never faced the opponent
    pub outcome: Result<Option<StatLine>>,
}

/// Players whose recorded position matches
pub fn position_cohort(players: &[Player], position: Position) -> Vec<Player> {
    players
        .iter()
        .filter(|p| p.position == Some(position))
        .cloned()
        .collect()
}

/// Matchup average minus season average for one player's game log.
///
/// Returns `None` if no game in the log was played against `opponent`.
pub fn player_delta(games: &[GameRecord], opponent: &Team) -> Option<StatLine> {
    let matchup_games: Vec<&GameRecord> = games.iter().filter(|g| g.faces(opponent)).collect();
    if matchup_games.is_empty() {
        return None;
    }

    let matchup_avg = mean_line(matchup_games.iter().map(|g| &g.stats));
    let season_avg = mean_line(games.iter().map(|g| &g.stats));

    Some(
        Stat::ALL
            .iter()
            .filter_map(|stat| {
                let m = matchup_avg.get(*stat)?;
                let s = season_avg.get(*stat)?;
                Some((*stat, m - s))
            })
            .collect(),
    )
}

/// Fetch each player's season log and compute their individual delta
pub fn collect_player_deltas<S: StatsSource + ?Sized>(
    source: &S,
    cohort: &[Player],
    opponent: &Team,
    season: &Season,
) -> Vec<PlayerDelta> {
    cohort
        .iter()
        .enumerate()
        .map(|(idx, player)| {
            log::debug!("[{}/{}] {}", idx + 1, cohort.len(), player.name);
            let outcome = source
                .player_game_log(player.id, season)
                .map(|games| player_delta(&games, opponent));
            PlayerDelta {
                player: player.clone(),
                outcome,
            }
        })
        .collect()
}

/// Average successful per-player deltas, discarding failures.
///
/// Each stat is averaged over the players that carry it. Stats with no
/// contributing value default to zero.
pub fn fold_deltas(results: Vec<PlayerDelta>) -> MatchupDelta {
    let mut values: BTreeMap<Stat, Vec<f64>> = BTreeMap::new();
    let mut contributors = 0;
    let mut skipped = 0;
    let mut failed = 0;

    for result in results {
        match result.outcome {
            Ok(Some(delta)) => {
                contributors += 1;
                for (stat, value) in delta.iter() {
                    values.entry(stat).or_default().push(value);
                }
            }
            Ok(None) => skipped += 1,
            Err(e) => {
                log::warn!("Error processing player {}: {}", result.player.name, e);
                failed += 1;
            }
        }
    }

    let deltas = Stat::ALL
        .iter()
        .map(|stat| {
            let avg = match values.get(stat) {
                Some(v) if !v.is_empty() => round_to(v.iter().sum::<f64>() / v.len() as f64, 2),
                _ => 0.0,
            };
            (*stat, avg)
        })
        .collect();

    MatchupDelta {
        deltas,
        contributors,
        skipped,
        failed,
    }
}

/// Average deltas for players at `position` when facing `opponent`.
///
/// Only the active-player listing is required; per-player failures are
/// logged and skipped.
pub fn estimate_matchup_delta<S: StatsSource + ?Sized>(
    source: &S,
    opponent: &Team,
    position: Position,
    season: &Season,
) -> Result<MatchupDelta> {
    log::info!(
        "Calculating matchup deltas for position {} against {}...",
        position,
        opponent.full_name
    );

    let players = source.active_players(season)?;
    let cohort = position_cohort(&players, position);
    log::info!("{} active players listed at {}", cohort.len(), position);

    let delta = fold_deltas(collect_player_deltas(source, &cohort, opponent, season));

    log::info!(
        "Matchup deltas calculated from {} players ({} without games vs {}, {} failed)",
        delta.contributors,
        delta.skipped,
        opponent.abbreviation,
        delta.failed
    );
    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemorySource;
    use crate::{PlayerId, Shooting};
    use chrono::NaiveDate;

    fn season() -> Season {
        Season::parse("2023-24").unwrap()
    }

    fn game(day: u32, opponent: &str, points: f64, rebounds: f64) -> GameRecord {
        let mut stats = StatLine::new();
        stats.insert(Stat::Points, points);
        stats.insert(Stat::Rebounds, rebounds);
        GameRecord {
            game_id: format!("g{}", day),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            team: "DEN".to_string(),
            opponent: opponent.to_string(),
            home: day % 2 == 0,
            matchup: if day % 2 == 0 {
                format!("DEN vs. {}", opponent)
            } else {
                format!("DEN @ {}", opponent)
            },
            minutes: Some(34.0),
            stats,
            shooting: Shooting::default(),
        }
    }

    fn player(id: i64, position: Position) -> Player {
        Player {
            id: PlayerId(id),
            name: format!("Player {}", id),
            position: Some(position),
        }
    }

    fn boston(source: &InMemorySource) -> Team {
        source.team_by_abbreviation("BOS").unwrap()
    }

    #[test]
    fn test_single_player_delta_is_exact() {
        let mut source = InMemorySource::new();
        source.add_player(player(1, Position::Center));
        source.add_game_log(
            PlayerId(1),
            season(),
            vec![
                game(1, "BOS", 30.0, 10.0),
                game(2, "MIA", 25.0, 10.0),
                game(3, "LAL", 25.0, 10.0),
                game(4, "NYK", 20.0, 10.0),
            ],
        );

        let bos = boston(&source);
        let delta = estimate_matchup_delta(&source, &bos, Position::Center, &season()).unwrap();
        assert_eq!(delta.get(Stat::Points), Some(5.0));
        assert_eq!(delta.get(Stat::Rebounds), Some(0.0));
        assert_eq!(delta.contributors, 1);
    }

    #[test]
    fn test_no_contributors_means_zero_deltas() {
        let mut source = InMemorySource::new();
        source.add_player(player(1, Position::Center));
        source.add_game_log(PlayerId(1), season(), vec![game(1, "MIA", 25.0, 10.0)]);

        let bos = boston(&source);
        let delta = estimate_matchup_delta(&source, &bos, Position::Center, &season()).unwrap();
        assert!(!delta.is_informative());
        assert_eq!(delta.skipped, 1);
        for stat in Stat::ALL {
            assert_eq!(delta.get(stat), Some(0.0));
        }
        assert_eq!(delta, MatchupDelta { skipped: 1, ..MatchupDelta::neutral() });
    }

    #[test]
    fn test_empty_cohort_is_neutral() {
        let source = InMemorySource::new();
        let bos = boston(&source);
        let delta = estimate_matchup_delta(&source, &bos, Position::Guard, &season()).unwrap();
        assert_eq!(delta, MatchupDelta::neutral());
    }

    #[test]
    fn test_failed_fetch_only_shrinks_sample() {
        let mut source = InMemorySource::new();
        source.add_player(player(1, Position::Center));
        source.add_player(player(2, Position::Center));
        source.add_game_log(
            PlayerId(1),
            season(),
            vec![game(1, "BOS", 12.0, 8.0), game(2, "MIA", 8.0, 8.0)],
        );
        source.fail_player(PlayerId(2));

        let bos = boston(&source);
        let delta = estimate_matchup_delta(&source, &bos, Position::Center, &season()).unwrap();
        assert_eq!(delta.contributors, 1);
        assert_eq!(delta.failed, 1);
        assert_eq!(delta.get(Stat::Points), Some(2.0));
    }

    #[test]
    fn test_other_positions_ignored() {
        let mut source = InMemorySource::new();
        source.add_player(player(1, Position::Center));
        source.add_player(player(2, Position::Guard));
        source.add_game_log(
            PlayerId(2),
            season(),
            vec![game(1, "BOS", 40.0, 2.0), game(2, "MIA", 10.0, 2.0)],
        );

        let bos = boston(&source);
        let delta = estimate_matchup_delta(&source, &bos, Position::Center, &season()).unwrap();
        assert_eq!(delta.get(Stat::Points), Some(0.0));
        assert_eq!(delta.skipped, 1);
    }

    #[test]
    fn test_deltas_averaged_and_rounded() {
        let mut first = StatLine::new();
        first.insert(Stat::Points, 1.0);
        let mut second = StatLine::new();
        second.insert(Stat::Points, 7.0 / 3.0);
        second.insert(Stat::Assists, -1.0);

        let results = vec![
            PlayerDelta { player: player(1, Position::Forward), outcome: Ok(Some(first)) },
            PlayerDelta { player: player(2, Position::Forward), outcome: Ok(Some(second)) },
        ];
        let delta = fold_deltas(results);
        // (1 + 2.333) / 2 = 1.6667
        assert_eq!(delta.get(Stat::Points), Some(1.67));
        // Only the second player carries assists
        assert_eq!(delta.get(Stat::Assists), Some(-1.0));
        assert_eq!(delta.get(Stat::Blocks), Some(0.0));
    }

    #[test]
    fn test_player_delta_matches_home_and_road() {
        let games = vec![
            game(1, "BOS", 20.0, 5.0),
            game(2, "BOS", 30.0, 5.0),
            game(3, "MIA", 10.0, 5.0),
        ];
        let source = InMemorySource::new();
        let delta = player_delta(&games, &boston(&source)).unwrap();
        // Matchup mean 25, season mean 20
        assert_eq!(delta.get(Stat::Points), Some(5.0));
        assert!(player_delta(&games[2..], &boston(&source)).is_none());
    }
}
