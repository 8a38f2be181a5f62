//! League-wide team rankings
//!
//! Per-team season averages from team game logs, ranked per stat with the
//! "min" tie scheme: tied teams share the lowest position and the next
//! distinct value keeps its positional rank (110, 105, 105 → 1, 2, 2).

use crate::data::StatsSource;
use crate::{Result, Season, Stat, StatLine, Team, TeamGameRecord, TeamId};
use std::collections::{BTreeMap, HashMap};

/// Season averages for one team
#[derive(Debug, Clone, PartialEq)]
pub struct TeamSeasonAggregate {
    pub team_id: TeamId,
    pub abbreviation: String,
    pub games: usize,
    pub averages: StatLine,
}

/// Mean of each stat over a set of lines, skipping missing values
pub fn mean_line<'a, I>(lines: I) -> StatLine
where
    I: IntoIterator<Item = &'a StatLine>,
{
    let mut sums: BTreeMap<Stat, (f64, usize)> = BTreeMap::new();
    for line in lines {
        for (stat, value) in line.iter() {
            let entry = sums.entry(stat).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(stat, (sum, count))| (stat, sum / count as f64))
        .collect()
}

/// Group team game logs by team and average each stat
pub fn aggregate_team_logs(logs: &[TeamGameRecord]) -> BTreeMap<TeamId, TeamSeasonAggregate> {
    let mut grouped: BTreeMap<TeamId, Vec<&TeamGameRecord>> = BTreeMap::new();
    for record in logs {
        grouped.entry(record.team_id).or_default().push(record);
    }

    grouped
        .into_iter()
        .map(|(team_id, records)| {
            let abbreviation = records
                .first()
                .map(|r| r.team_abbreviation.clone())
                .unwrap_or_default();
            let aggregate = TeamSeasonAggregate {
                team_id,
                abbreviation,
                games: records.len(),
                averages: mean_line(records.iter().map(|r| &r.stats)),
            };
            (team_id, aggregate)
        })
        .collect()
}

/// Rank values descending with "min" tie-breaking.
///
/// Rank = 1 + number of entries with a strictly greater value.
pub fn min_rank(values: &[(TeamId, f64)]) -> HashMap<TeamId, u32> {
    values
        .iter()
        .map(|(team, value)| {
            let greater = values.iter().filter(|(_, other)| other > value).count();
            (*team, greater as u32 + 1)
        })
        .collect()
}

/// League rankings for one season
#[derive(Debug, Clone)]
pub struct LeagueRankings {
    season: Season,
    aggregates: BTreeMap<TeamId, TeamSeasonAggregate>,
    ranks: BTreeMap<Stat, HashMap<TeamId, u32>>,
}

impl LeagueRankings {
    /// Build rankings from a season of team game logs.
    ///
    /// Empty logs produce empty rankings.
    pub fn from_team_logs(season: Season, logs: &[TeamGameRecord]) -> Self {
        let aggregates = aggregate_team_logs(logs);

        let mut ranks = BTreeMap::new();
        for stat in Stat::ALL {
            let values: Vec<(TeamId, f64)> = aggregates
                .values()
                .filter_map(|a| a.averages.get(stat).map(|v| (a.team_id, v)))
                .collect();
            if !values.is_empty() {
                ranks.insert(stat, min_rank(&values));
            }
        }

        LeagueRankings {
            season,
            aggregates,
            ranks,
        }
    }

    pub fn season(&self) -> &Season {
        &self.season
    }

    /// Rankings are valid for exactly one season
    pub fn is_valid_for(&self, season: &Season) -> bool {
        &self.season == season
    }

    /// Rank of a team for a stat, `None` when unavailable
    pub fn rank(&self, stat: Stat, team: TeamId) -> Option<u32> {
        self.ranks.get(&stat).and_then(|r| r.get(&team)).copied()
    }

    pub fn ranks_for(&self, stat: Stat) -> Option<&HashMap<TeamId, u32>> {
        self.ranks.get(&stat)
    }

    pub fn aggregate(&self, team: TeamId) -> Option<&TeamSeasonAggregate> {
        self.aggregates.get(&team)
    }

    /// Aggregates ordered by rank for a stat (best first)
    pub fn ordered_by(&self, stat: Stat) -> Vec<(u32, &TeamSeasonAggregate)> {
        let mut ordered: Vec<(u32, &TeamSeasonAggregate)> = self
            .aggregates
            .values()
            .filter_map(|a| self.rank(stat, a.team_id).map(|r| (r, a)))
            .collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.abbreviation.cmp(&b.1.abbreviation)));
        ordered
    }

    pub fn team_count(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Holds the rankings for the season currently under analysis.
///
/// Rankings are reused while the season stays the same and recomputed
/// when a different season is requested.
#[derive(Debug, Default)]
pub struct RankingsCache {
    current: Option<LeagueRankings>,
}

impl RankingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute<S: StatsSource + ?Sized>(
        &mut self,
        source: &S,
        season: &Season,
    ) -> Result<&LeagueRankings> {
        let rankings = match self.current.take() {
            Some(r) if r.is_valid_for(season) => r,
            _ => {
                log::info!("Fetching league-wide team statistics for {} rankings...", season);
                let logs = source.team_game_logs(season, None)?;
                let rankings = LeagueRankings::from_team_logs(season.clone(), &logs);
                log::info!("League-wide team rankings calculated ({} teams)", rankings.team_count());
                rankings
            }
        };
        let rankings: &LeagueRankings = self.current.insert(rankings);
        Ok(rankings)
    }
}

/// Recent form and league standing of an opponent
#[derive(Debug, Clone)]
pub struct OpponentProfile {
    pub team: Team,
    /// Number of recent games averaged
    pub games: usize,
    /// Averages over the recent games, rounded to 1 decimal
    pub averages: StatLine,
    /// Season rank per stat, `None` when unavailable
    pub ranks: BTreeMap<Stat, Option<u32>>,
}

/// Average an opponent's most recent `num_games` games and attach its ranks.
///
/// Returns `None` when the team has no games this season.
pub fn opponent_profile<S: StatsSource + ?Sized>(
    source: &S,
    team: &Team,
    rankings: &LeagueRankings,
    season: &Season,
    num_games: usize,
) -> Result<Option<OpponentProfile>> {
    let mut logs = source.team_game_logs(season, Some(team.id))?;
    if logs.is_empty() {
        return Ok(None);
    }
    logs.sort_by_key(|r| r.date);
    let recent = &logs[logs.len().saturating_sub(num_games)..];

    let averages = mean_line(recent.iter().map(|r| &r.stats)).rounded(1);
    let ranks = Stat::ALL
        .iter()
        .map(|s| (*s, rankings.rank(*s, team.id)))
        .collect();

    Ok(Some(OpponentProfile {
        team: team.clone(),
        games: recent.len(),
        averages,
        ranks,
    }))
}
