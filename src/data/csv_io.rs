//! Game log CSV files

use crate::{GameRecord, Matchup, Result, Shooting, Stat, StatLine};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Flat CSV row for a game record, using the API's column names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct GameLogRow {
    game_id: String,
    game_date: NaiveDate,
    team: String,
    opponent: String,
    matchup: String,
    min: Option<f64>,
    pts: Option<f64>,
    reb: Option<f64>,
    ast: Option<f64>,
    stl: Option<f64>,
    blk: Option<f64>,
    fgm: Option<f64>,
    fga: Option<f64>,
    fg_pct: Option<f64>,
    fg3a: Option<f64>,
    fg3_pct: Option<f64>,
    ft_pct: Option<f64>,
}

impl From<&GameRecord> for GameLogRow {
    fn from(r: &GameRecord) -> Self {
        GameLogRow {
            game_id: r.game_id.clone(),
            game_date: r.date,
            team: r.team.clone(),
            opponent: r.opponent.clone(),
            matchup: r.matchup.clone(),
            min: r.minutes,
            pts: r.stats.get(Stat::Points),
            reb: r.stats.get(Stat::Rebounds),
            ast: r.stats.get(Stat::Assists),
            stl: r.stats.get(Stat::Steals),
            blk: r.stats.get(Stat::Blocks),
            fgm: r.shooting.fgm,
            fga: r.shooting.fga,
            fg_pct: r.shooting.fg_pct,
            fg3a: r.shooting.fg3a,
            fg3_pct: r.shooting.fg3_pct,
            ft_pct: r.shooting.ft_pct,
        }
    }
}

impl From<GameLogRow> for GameRecord {
    fn from(row: GameLogRow) -> Self {
        let mut stats = StatLine::new();
        for (stat, value) in [
            (Stat::Points, row.pts),
            (Stat::Rebounds, row.reb),
            (Stat::Assists, row.ast),
            (Stat::Steals, row.stl),
            (Stat::Blocks, row.blk),
        ] {
            if let Some(v) = value {
                stats.insert(stat, v);
            }
        }

        let home = Matchup::parse(&row.matchup).map(|m| m.home).unwrap_or(false);
        GameRecord {
            game_id: row.game_id,
            date: row.game_date,
            team: row.team,
            opponent: row.opponent,
            home,
            matchup: row.matchup,
            minutes: row.min,
            stats,
            shooting: Shooting {
                fgm: row.fgm,
                fga: row.fga,
                fg_pct: row.fg_pct,
                fg3a: row.fg3a,
                fg3_pct: row.fg3_pct,
                ft_pct: row.ft_pct,
            },
        }
    }
}

/// Write game records to a CSV file, creating parent directories
pub fn write_game_log<P: AsRef<Path>>(path: P, records: &[GameRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(GameLogRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read game records from a CSV file, sorted by date ascending
pub fn read_game_log<P: AsRef<Path>>(path: P) -> Result<Vec<GameRecord>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut records = Vec::new();
    for row in reader.deserialize::<GameLogRow>() {
        records.push(GameRecord::from(row?));
    }
    records.sort_by_key(|r| r.date);
    Ok(records)
}
