//! Text and CSV output for projections and rankings

use std::path::{Path, PathBuf};

use super::inference::StatPrediction;
use super::pipeline::Analysis;
use crate::features::rankings::{LeagueRankings, OpponentProfile};
use crate::features::matchup::MatchupDelta;
use crate::training::TrainedModel;
use crate::{Result, Stat};

/// File name for a player's projected line, e.g. `LeBron_James_projected_stats.csv`
pub fn projection_file_name(player: &str) -> String {
    format!("{}_projected_stats.csv", player.trim().replace(' ', "_"))
}

/// Write the projected line as a single CSV row into `dir`
pub fn write_projection_csv(dir: &Path, analysis: &Analysis) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(projection_file_name(&analysis.player.name));

    let entries = analysis.projection.entries();
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(entries.iter().map(|(label, _)| label.as_str()))?;
    writer.write_record(entries.iter().map(|(_, value)| format!("{:.1}", value)))?;
    writer.flush()?;

    log::info!("Projected stats saved to '{}'", path.display());
    Ok(path)
}

fn format_rank(rank: Option<u32>) -> String {
    rank.map(|r| r.to_string()).unwrap_or_else(|| "N/A".to_string())
}

/// Opponent averages with league ranks
pub fn format_opponent_profile(profile: &OpponentProfile) -> String {
    let mut out = format!(
        "Opponent {} (last {} games):\n",
        profile.team.full_name, profile.games
    );
    for stat in Stat::ALL {
        let value = profile
            .averages
            .get(stat)
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "N/A".to_string());
        let rank = profile.ranks.get(&stat).copied().flatten();
        out.push_str(&format!("  {:<4} {:>6}   rank {}\n", stat.code(), value, format_rank(rank)));
    }
    out
}

pub fn format_matchup(delta: &MatchupDelta) -> String {
    let mut out = format!(
        "Matchup deltas ({} players, {} skipped, {} failed):\n",
        delta.contributors, delta.skipped, delta.failed
    );
    for (stat, value) in delta.deltas.iter() {
        out.push_str(&format!("  {:<4} {:+.2}\n", stat.code(), value));
    }
    out
}

/// Full report for one analysis request
pub fn format_analysis(analysis: &Analysis) -> String {
    let opponent = analysis
        .opponent
        .as_ref()
        .map(|t| t.full_name.as_str())
        .unwrap_or("no opponent");
    let position = analysis
        .position
        .map(|p| p.code().to_string())
        .unwrap_or_else(|| "?".to_string());

    let mut out = String::new();
    out.push_str("\n┌─────────────────────────────────────────────────┐\n");
    out.push_str(&format!("│  {} ({}) vs {}\n", analysis.player.name, position, opponent));
    out.push_str(&format!(
        "│  Season {}, last {} games\n",
        analysis.season, analysis.base.games
    ));
    out.push_str("├─────────────────────────────────────────────────┤\n");

    for (label, value) in analysis.projection.entries() {
        let base = Stat::from_code(&label).and_then(|s| analysis.base.stats.get(s));
        let delta = Stat::from_code(&label)
            .and_then(|s| analysis.matchup.as_ref().and_then(|m| m.get(s)));
        match (base, delta) {
            (Some(b), Some(d)) => out.push_str(&format!(
                "│  {:<6} {:>6.1}   (form {:.1}, matchup {:+.2})\n",
                label, value, b, d
            )),
            _ => out.push_str(&format!("│  {:<6} {:>6.1}\n", label, value)),
        }
    }

    let note = if analysis.is_adjusted() {
        "adjusted for opponent matchup"
    } else {
        "recent form only"
    };
    out.push_str(&format!("│  Projection: {}\n", note));
    out.push_str("└─────────────────────────────────────────────────┘\n");
    out
}

/// League table ordered by one stat
pub fn format_rankings(rankings: &LeagueRankings, stat: Stat) -> String {
    let mut out = format!(
        "{} team rankings by {} ({} teams)\n",
        rankings.season(),
        stat.code(),
        rankings.team_count()
    );
    out.push_str(&format!("{:>4}  {:<5} {:>8} {:>6}\n", "Rank", "Team", stat.code(), "Games"));
    for (rank, aggregate) in rankings.ordered_by(stat) {
        let value = aggregate.averages.get(stat).unwrap_or(0.0);
        out.push_str(&format!(
            "{:>4}  {:<5} {:>8.1} {:>6}\n",
            rank, aggregate.abbreviation, value, aggregate.games
        ));
    }
    out
}

/// Hold-out evaluation summary for a freshly trained model
pub fn format_training(model: &TrainedModel) -> String {
    let metrics = model.metrics();
    format!(
        "Model ({}) for {}:\n  Mean Squared Error: {:.2}\n  R-squared: {:.2}\n  Test rows: {}\n",
        model.kind(),
        model.target(),
        metrics.mse,
        metrics.r2,
        metrics.samples
    )
}

pub fn format_predictions(player: &str, predictions: &[StatPrediction]) -> String {
    let mut out = format!("Next-game predictions for {}:\n", player);
    for p in predictions {
        out.push_str(&format!("  {:<4} {:>6.2}   ({})\n", p.target.code(), p.value, p.kind));
    }
    out
}
