//! stats.nba.com client
//!
//! Blocking client for the JSON endpoints behind nba.com/stats. Responses
//! can be cached on disk so repeated analyses (and tests) run offline.

use super::source::{with_retry, StatsSource};
use super::teams::nba_teams;
use crate::{
    ApiConfig, GameRecord, HoopsError, Matchup, Player, PlayerId, Position, Result, Season,
    Shooting, Stat, StatLine, Team, TeamGameRecord, TeamId,
};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Client for the NBA stats API
pub struct NbaStatsClient {
    client: reqwest::blocking::Client,
    base_url: String,
    season_type: String,
    max_attempts: u32,
    /// Optional cache directory for JSON responses
    cache_dir: Option<PathBuf>,
    /// If true, only use cache (no network requests)
    offline_only: bool,
}

impl NbaStatsClient {
    pub fn new(config: &ApiConfig, season_type: &str) -> Result<Self> {
        // stats.nba.com rejects requests that don't look like they come from the site
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
            ),
        );
        headers.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.nba.com"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert("x-nba-stats-origin", HeaderValue::from_static("stats"));
        headers.insert("x-nba-stats-token", HeaderValue::from_static("true"));

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut stats_client = NbaStatsClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            season_type: season_type.to_string(),
            max_attempts: config.max_attempts,
            cache_dir: None,
            offline_only: config.offline,
        };
        if let Some(dir) = &config.cache_dir {
            stats_client = stats_client.with_cache(dir);
        }
        Ok(stats_client)
    }

    /// Create client with a cache directory
    pub fn with_cache<P: AsRef<Path>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = Some(cache_dir.as_ref().to_path_buf());
        self
    }

    /// Set offline-only mode (no network requests, cache must exist)
    pub fn offline_only(mut self, offline: bool) -> Self {
        self.offline_only = offline;
        self
    }

    /// Get the cache file path for a request
    fn cache_path(&self, endpoint: &str, params: &[(&str, String)]) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| {
            let mut filename = endpoint.to_string();
            for (key, value) in params {
                filename.push('_');
                filename.push_str(key);
                filename.push('-');
                filename.push_str(value);
            }
            let filename: String = filename
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '+' })
                .collect();
            dir.join(filename + ".json")
        })
    }

    fn load_from_cache(&self, endpoint: &str, params: &[(&str, String)]) -> Option<String> {
        let path = self.cache_path(endpoint, params)?;
        if path.exists() {
            log::debug!("Loading from cache: {}", path.display());
            std::fs::read_to_string(&path).ok()
        } else {
            None
        }
    }

    fn save_to_cache(&self, endpoint: &str, params: &[(&str, String)], body: &str) -> Result<()> {
        if let Some(path) = self.cache_path(endpoint, params) {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, body)?;
            log::debug!("Saved to cache: {}", path.display());
        }
        Ok(())
    }

    fn fetch_body(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String> {
        if let Some(body) = self.load_from_cache(endpoint, params) {
            return Ok(body);
        }

        if self.offline_only {
            return Err(HoopsError::Fetch {
                endpoint: endpoint.to_string(),
                message: "response not cached and offline mode is enabled".to_string(),
            });
        }

        let url = format!("{}/{}", self.base_url, endpoint);
        log::debug!("GET {} {:?}", url, params);

        let body = with_retry(
            || {
                let resp = self.client.get(&url).query(params).send()?;
                if !resp.status().is_success() {
                    return Err(HoopsError::Fetch {
                        endpoint: endpoint.to_string(),
                        message: format!("server returned {}", resp.status()),
                    });
                }
                Ok(resp.text()?)
            },
            self.max_attempts,
        )?;

        if let Err(e) = self.save_to_cache(endpoint, params, &body) {
            log::warn!("Failed to cache {} response: {}", endpoint, e);
        }
        Ok(body)
    }

    /// Fetch an endpoint and return its first result set
    fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<ResultSet> {
        let body = self.fetch_body(endpoint, params)?;
        let response: StatsResponse = serde_json::from_str(&body).map_err(|e| HoopsError::Fetch {
            endpoint: endpoint.to_string(),
            message: format!("unexpected payload: {}", e),
        })?;
        response.into_first().ok_or_else(|| HoopsError::Fetch {
            endpoint: endpoint.to_string(),
            message: "response has no result sets".to_string(),
        })
    }
}

impl StatsSource for NbaStatsClient {
    fn player_game_log(&self, player: PlayerId, season: &Season) -> Result<Vec<GameRecord>> {
        let params = [
            ("PlayerID", player.0.to_string()),
            ("Season", season.to_string()),
            ("SeasonType", self.season_type.clone()),
        ];
        let set = self.get("playergamelog", &params)?;
        Ok(parse_player_game_log(&set))
    }

    fn team_game_logs(&self, season: &Season, team: Option<TeamId>) -> Result<Vec<TeamGameRecord>> {
        let mut params = vec![
            ("Season", season.to_string()),
            ("SeasonType", self.season_type.clone()),
        ];
        if let Some(team) = team {
            params.push(("TeamID", team.0.to_string()));
        }
        let set = self.get("teamgamelogs", &params)?;
        Ok(parse_team_game_logs(&set))
    }

    fn player_position(&self, player: PlayerId) -> Result<Option<Position>> {
        let params = [("PlayerID", player.0.to_string())];
        let set = self.get("commonplayerinfo", &params)?;
        let position = set
            .rows()
            .next()
            .and_then(|row| row.text("POSITION"))
            .and_then(|raw| Position::parse(&raw));
        Ok(position)
    }

    fn active_players(&self, season: &Season) -> Result<Vec<Player>> {
        let params = [
            ("LeagueID", "00".to_string()),
            ("Season", season.to_string()),
            ("Historical", "0".to_string()),
        ];
        let set = self.get("playerindex", &params)?;
        Ok(parse_player_index(&set))
    }

    fn teams(&self) -> Result<Vec<Team>> {
        Ok(nba_teams())
    }
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(rename = "resultSets", alias = "resultSet")]
    result_sets: ResultSets,
}

impl StatsResponse {
    fn into_first(self) -> Option<ResultSet> {
        match self.result_sets {
            ResultSets::Many(sets) => sets.into_iter().next(),
            ResultSets::One(set) => Some(set),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResultSets {
    Many(Vec<ResultSet>),
    One(ResultSet),
}

/// A tabular result set: column headers plus rows of JSON values
#[derive(Debug, Clone, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub name: String,
    pub headers: Vec<String>,
    #[serde(rename = "rowSet")]
    pub row_set: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Case-insensitive column lookup
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.row_set.iter().map(move |values| Row { set: self, values })
    }
}

/// A row view with typed accessors
pub struct Row<'a> {
    set: &'a ResultSet,
    values: &'a [Value],
}

impl<'a> Row<'a> {
    fn value(&self, column: &str) -> Option<&'a Value> {
        self.set.column(column).and_then(|i| self.values.get(i))
    }

    /// Numeric value; numeric strings are coerced, anything else is missing
    pub fn number(&self, column: &str) -> Option<f64> {
        let value = match self.value(column)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn text(&self, column: &str) -> Option<String> {
        match self.value(column)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn id(&self, column: &str) -> Option<i64> {
        self.number(column).map(|v| v as i64)
    }

    fn stat_line(&self) -> StatLine {
        let mut line = StatLine::new();
        for stat in Stat::ALL {
            if let Some(value) = self.number(stat.code()) {
                line.insert(stat, value);
            }
        }
        line
    }
}

/// Parse the API's game dates (`APR 14, 2024` or `2024-04-14T00:00:00`)
pub fn parse_game_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%b %d, %Y") {
        return Some(date);
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Convert a `playergamelog` result set into records sorted by date ascending
pub fn parse_player_game_log(set: &ResultSet) -> Vec<GameRecord> {
    let mut records: Vec<GameRecord> = set
        .rows()
        .filter_map(|row| {
            let date = row.text("GAME_DATE").and_then(|d| parse_game_date(&d));
            let Some(date) = date else {
                log::warn!("Skipping game log row without a readable date");
                return None;
            };
            let matchup = row.text("MATCHUP").unwrap_or_default();
            let parsed = Matchup::parse(&matchup);
            Some(GameRecord {
                game_id: row.text("Game_ID").unwrap_or_default(),
                date,
                team: parsed.as_ref().map(|m| m.team.clone()).unwrap_or_default(),
                opponent: parsed.as_ref().map(|m| m.opponent.clone()).unwrap_or_default(),
                home: parsed.as_ref().map(|m| m.home).unwrap_or(false),
                matchup,
                minutes: row.number("MIN"),
                stats: row.stat_line(),
                shooting: Shooting {
                    fgm: row.number("FGM"),
                    fga: row.number("FGA"),
                    fg_pct: row.number("FG_PCT"),
                    fg3a: row.number("FG3A"),
                    fg3_pct: row.number("FG3_PCT"),
                    ft_pct: row.number("FT_PCT"),
                },
            })
        })
        .collect();
    records.sort_by_key(|r| r.date);
    records
}

/// Convert a `teamgamelogs` result set into team records
pub fn parse_team_game_logs(set: &ResultSet) -> Vec<TeamGameRecord> {
    set.rows()
        .filter_map(|row| {
            let team_id = row.id("TEAM_ID")?;
            let date = row.text("GAME_DATE").and_then(|d| parse_game_date(&d))?;
            Some(TeamGameRecord {
                team_id: TeamId(team_id),
                team_abbreviation: row.text("TEAM_ABBREVIATION").unwrap_or_default(),
                game_id: row.text("GAME_ID").unwrap_or_default(),
                date,
                matchup: row.text("MATCHUP").unwrap_or_default(),
                stats: row.stat_line(),
            })
        })
        .collect()
}

/// Convert a `playerindex` result set into players
pub fn parse_player_index(set: &ResultSet) -> Vec<Player> {
    set.rows()
        .filter_map(|row| {
            let id = row.id("PERSON_ID")?;
            let first = row.text("PLAYER_FIRST_NAME").unwrap_or_default();
            let last = row.text("PLAYER_LAST_NAME").unwrap_or_default();
            let name = format!("{} {}", first, last).trim().to_string();
            Some(Player {
                id: PlayerId(id),
                name,
                position: row.text("POSITION").and_then(|p| Position::parse(&p)),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    const GAME_LOG: &str = r#"{
        "resource": "playergamelog",
        "resultSets": [{
            "name": "PlayerGameLog",
            "headers": ["SEASON_ID", "Player_ID", "Game_ID", "GAME_DATE", "MATCHUP", "WL", "MIN",
                        "FGM", "FGA", "FG_PCT", "FG3A", "FG3_PCT", "FT_PCT",
                        "REB", "AST", "STL", "BLK", "PTS"],
            "rowSet": [
                ["22023", 2544, "0022301195", "APR 14, 2024", "LAL vs. NOP", "W", 41,
                 11, 19, 0.579, 4, 0.5, 0.75, 7, 10, 2, 1, 28],
                ["22023", 2544, "0022301180", "APR 12, 2024", "LAL @ MEM", "W", 36,
                 8, 15, 0.533, 5, 0.4, null, 6, 11, 1, 0, "21"]
            ]
        }]
    }"#;

    fn result_set(body: &str) -> ResultSet {
        let response: StatsResponse = serde_json::from_str(body).unwrap();
        response.into_first().unwrap()
    }

    #[test]
    fn test_parse_player_game_log_sorts_ascending() {
        let records = parse_player_game_log(&result_set(GAME_LOG));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 4, 12).unwrap());
        assert_eq!(records[0].opponent, "MEM");
        assert!(!records[0].home);
        assert_eq!(records[1].opponent, "NOP");
        assert!(records[1].home);
        assert_eq!(records[1].minutes, Some(41.0));
    }

    #[test]
    fn test_parse_coerces_numeric_strings_and_nulls() {
        let records = parse_player_game_log(&result_set(GAME_LOG));
        assert_eq!(records[0].stats.get(Stat::Points), Some(21.0));
        assert_eq!(records[0].shooting.ft_pct, None);
        assert_eq!(records[1].stats.get(Stat::Blocks), Some(1.0));
    }

    #[test]
    fn test_parse_team_game_logs() {
        let body = r#"{"resultSets": [{"name": "TeamGameLogs",
            "headers": ["SEASON_YEAR", "TEAM_ID", "TEAM_ABBREVIATION", "GAME_ID", "GAME_DATE", "MATCHUP", "PTS", "REB"],
            "rowSet": [["2023-24", 1610612747, "LAL", "0022301195", "2024-04-14T00:00:00", "LAL vs. NOP", 124, 44]]}]}"#;
        let records = parse_team_game_logs(&result_set(body));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].team_id, TeamId(1610612747));
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 4, 14).unwrap());
        assert_eq!(records[0].stats.get(Stat::Points), Some(124.0));
        assert!(!records[0].stats.contains(Stat::Assists));
    }

    #[test]
    fn test_parse_player_index() {
        let body = r#"{"resultSets": [{"name": "PlayerIndex",
            "headers": ["PERSON_ID", "PLAYER_LAST_NAME", "PLAYER_FIRST_NAME", "POSITION"],
            "rowSet": [[203999, "Jokic", "Nikola", "C"], [2544, "James", "LeBron", "F"], [1, "Doe", "John", ""]]}]}"#;
        let players = parse_player_index(&result_set(body));
        assert_eq!(players.len(), 3);
        assert_eq!(players[0].name, "Nikola Jokic");
        assert_eq!(players[0].position, Some(Position::Center));
        assert_eq!(players[2].position, None);
    }

    #[test]
    fn test_offline_client_reads_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let client = NbaStatsClient::new(&config.api, "Regular Season")
            .unwrap()
            .with_cache(dir.path())
            .offline_only(true);

        let season = Season::parse("2023-24").unwrap();
        let params = [
            ("PlayerID", "2544".to_string()),
            ("Season", season.to_string()),
            ("SeasonType", "Regular Season".to_string()),
        ];
        client.save_to_cache("playergamelog", &params, GAME_LOG).unwrap();

        let records = client.player_game_log(PlayerId(2544), &season).unwrap();
        assert_eq!(records.len(), 2);

        let missing = client.player_game_log(PlayerId(1), &season);
        assert!(matches!(missing, Err(HoopsError::Fetch { .. })));
    }

    #[test]
    fn test_offline_player_position_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let client = NbaStatsClient::new(&Config::default().api, "Regular Season")
            .unwrap()
            .with_cache(dir.path())
            .offline_only(true);

        let body = r#"{"resultSets": [{"name": "CommonPlayerInfo",
            "headers": ["PERSON_ID", "DISPLAY_FIRST_LAST", "POSITION"],
            "rowSet": [[2544, "LeBron James", "Forward-Guard"]]}]}"#;
        client
            .save_to_cache("commonplayerinfo", &[("PlayerID", "2544".to_string())], body)
            .unwrap();

        assert_eq!(client.player_position(PlayerId(2544)).unwrap(), Some(Position::Forward));
        assert!(client.player_position(PlayerId(1)).is_err());
    }
}
