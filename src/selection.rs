//! Player and opponent lookup
//!
//! Searches return a `Selection` instead of prompting, so the CLI can
//! resolve ambiguity from flags and the interactive loop can ask the user.

use crate::{GameRecord, HoopsError, Player, Result, Team};
use std::collections::BTreeSet;

/// Outcome of a search
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<T> {
    NoMatch,
    Unique(T),
    Ambiguous(Vec<T>),
}

impl<T: Clone> Selection<T> {
    fn from_candidates(mut candidates: Vec<T>) -> Self {
        match candidates.len() {
            0 => Selection::NoMatch,
            1 => Selection::Unique(candidates.remove(0)),
            _ => Selection::Ambiguous(candidates),
        }
    }

    pub fn candidates(&self) -> Vec<T> {
        match self {
            Selection::NoMatch => Vec::new(),
            Selection::Unique(item) => vec![item.clone()],
            Selection::Ambiguous(items) => items.clone(),
        }
    }

    /// Resolve using a 1-based pick for ambiguous results.
    ///
    /// A unique match ignores the pick.
    pub fn resolve(self, pick: Option<usize>, what: &str) -> Result<T> {
        match self {
            Selection::NoMatch => Err(HoopsError::NotFound(what.to_string())),
            Selection::Unique(item) => Ok(item),
            Selection::Ambiguous(items) => {
                let count = items.len();
                let pick = pick.ok_or_else(|| {
                    HoopsError::InvalidSelection(format!(
                        "{} matches for {}, choose one with a number between 1 and {}",
                        count, what, count
                    ))
                })?;
                if pick == 0 || pick > count {
                    return Err(HoopsError::InvalidSelection(format!(
                        "{} is not between 1 and {}",
                        pick, count
                    )));
                }
                items
                    .into_iter()
                    .nth(pick - 1)
                    .ok_or_else(|| HoopsError::InvalidSelection(format!("{} is out of range", pick)))
            }
        }
    }
}

/// Case-insensitive substring search over player names.
///
/// Keeps at most `max_candidates` players in listing order.
pub fn match_players(players: &[Player], query: &str, max_candidates: usize) -> Selection<Player> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Selection::NoMatch;
    }

    let matches: Vec<Player> = players
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .cloned()
        .collect();

    // An exact name wins over partial matches
    if let Some(exact) = matches.iter().find(|p| p.name.to_lowercase() == needle) {
        return Selection::Unique(exact.clone());
    }

    if matches.len() > max_candidates {
        log::info!(
            "{} players match '{}', showing the first {}",
            matches.len(),
            query,
            max_candidates
        );
    }
    Selection::from_candidates(matches.into_iter().take(max_candidates).collect())
}

/// Teams the player faced in this log, ordered by abbreviation
pub fn opponent_candidates(games: &[GameRecord], teams: &[Team]) -> Vec<Team> {
    let faced: BTreeSet<&str> = games.iter().map(|g| g.opponent.as_str()).collect();
    let mut candidates: Vec<Team> = teams
        .iter()
        .filter(|t| faced.contains(t.abbreviation.as_str()))
        .cloned()
        .collect();
    candidates.sort_by(|a, b| a.abbreviation.cmp(&b.abbreviation));
    candidates
}

/// Resolve an opponent given by abbreviation or full name
pub fn match_opponent(candidates: &[Team], query: &str) -> Selection<Team> {
    let needle = query.trim().to_lowercase();
    if let Some(team) = candidates.iter().find(|t| t.matches_name(query)) {
        return Selection::Unique(team.clone());
    }
    Selection::from_candidates(
        candidates
            .iter()
            .filter(|t| !needle.is_empty() && t.full_name.to_lowercase().contains(&needle))
            .cloned()
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::teams::nba_teams;
    use crate::{PlayerId, Shooting, StatLine};
    use chrono::NaiveDate;

    fn make_player(id: i64, name: &str) -> Player {
        Player {
            id: PlayerId(id),
            name: name.to_string(),
            position: None,
        }
    }

    fn roster() -> Vec<Player> {
        vec![
            make_player(1, "LeBron James"),
            make_player(2, "Jalen Brunson"),
            make_player(3, "Jaylen Brown"),
            make_player(4, "Bruce Brown"),
        ]
    }

    fn game(opponent: &str) -> GameRecord {
        GameRecord {
            game_id: opponent.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            team: "LAL".to_string(),
            opponent: opponent.to_string(),
            home: false,
            matchup: format!("LAL @ {}", opponent),
            minutes: None,
            stats: StatLine::new(),
            shooting: Shooting::default(),
        }
    }

    #[test]
    fn test_unique_match_is_case_insensitive() {
        let selection = match_players(&roster(), "lebron", 12);
        assert_eq!(selection, Selection::Unique(make_player(1, "LeBron James")));
    }

    #[test]
    fn test_ambiguous_and_truncated() {
        let selection = match_players(&roster(), "brown", 12);
        assert_eq!(selection.candidates().len(), 2);

        let truncated = match_players(&roster(), "j", 2);
        match truncated {
            Selection::Ambiguous(players) => {
                assert_eq!(players.len(), 2);
                assert_eq!(players[0].id, PlayerId(1));
            }
            other => panic!("expected ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_no_match() {
        assert_eq!(match_players(&roster(), "Jordan", 12), Selection::NoMatch);
        assert_eq!(match_players(&roster(), "   ", 12), Selection::NoMatch);
    }

    #[test]
    fn test_resolve_pick() {
        let selection = match_players(&roster(), "brown", 12);
        let picked = selection.clone().resolve(Some(2), "brown").unwrap();
        assert_eq!(picked.id, PlayerId(4));

        assert!(matches!(
            selection.clone().resolve(Some(3), "brown"),
            Err(HoopsError::InvalidSelection(_))
        ));
        assert!(matches!(
            selection.clone().resolve(Some(0), "brown"),
            Err(HoopsError::InvalidSelection(_))
        ));
        assert!(matches!(selection.resolve(None, "brown"), Err(HoopsError::InvalidSelection(_))));
        assert!(matches!(
            Selection::<Player>::NoMatch.resolve(Some(1), "nobody"),
            Err(HoopsError::NotFound(_))
        ));
    }

    #[test]
    fn test_opponents_from_log() {
        let games = vec![game("BOS"), game("MIA"), game("BOS"), game("XYZ")];
        let candidates = opponent_candidates(&games, &nba_teams());
        let abbrs: Vec<&str> = candidates.iter().map(|t| t.abbreviation.as_str()).collect();
        assert_eq!(abbrs, vec!["BOS", "MIA"]);

        assert_eq!(
            match_opponent(&candidates, "Boston Celtics").candidates()[0].abbreviation,
            "BOS"
        );
        assert_eq!(match_opponent(&candidates, "mia").candidates()[0].abbreviation, "MIA");
        assert_eq!(match_opponent(&candidates, "Lakers"), Selection::NoMatch);
    }

    #[test]
    fn test_shared_city_needs_a_pick() {
        let teams = nba_teams();
        let selection = match_opponent(&teams, "Los Angeles");
        assert_eq!(selection.candidates().len(), 2);
        assert!(matches!(
            selection.clone().resolve(None, "team 'Los Angeles'"),
            Err(HoopsError::InvalidSelection(_))
        ));
        assert_eq!(selection.resolve(Some(2), "team 'Los Angeles'").unwrap().abbreviation, "LAL");
    }
}
