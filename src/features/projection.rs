//! Projected stat lines
//!
//! Applies matchup deltas to a weighted base line. Combination stats
//! (P+R, P+A, R+A, P+R+A) are always derived from the adjusted base stats,
//! so they include the matchup adjustment.

use crate::{round_to, Stat, StatLine};
use std::fmt;

/// Derived combination stats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combo {
    PointsRebounds,
    PointsAssists,
    ReboundsAssists,
    PointsReboundsAssists,
}

impl Combo {
    pub const ALL: [Combo; 4] = [
        Combo::PointsRebounds,
        Combo::PointsAssists,
        Combo::ReboundsAssists,
        Combo::PointsReboundsAssists,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Combo::PointsRebounds => "P+R",
            Combo::PointsAssists => "P+A",
            Combo::ReboundsAssists => "R+A",
            Combo::PointsReboundsAssists => "P+R+A",
        }
    }

    pub fn components(&self) -> &'static [Stat] {
        match self {
            Combo::PointsRebounds => &[Stat::Points, Stat::Rebounds],
            Combo::PointsAssists => &[Stat::Points, Stat::Assists],
            Combo::ReboundsAssists => &[Stat::Rebounds, Stat::Assists],
            Combo::PointsReboundsAssists => &[Stat::Points, Stat::Rebounds, Stat::Assists],
        }
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Final projection for a single analysis request
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedLine {
    stats: StatLine,
}

impl ProjectedLine {
    /// Wrap a line, rounding every stat to 1 decimal
    pub fn new(stats: &StatLine) -> Self {
        ProjectedLine {
            stats: stats.rounded(1),
        }
    }

    pub fn stats(&self) -> &StatLine {
        &self.stats
    }

    pub fn get(&self, stat: Stat) -> Option<f64> {
        self.stats.get(stat)
    }

    /// Sum of the combo's components, present only if every component is
    pub fn combo(&self, combo: Combo) -> Option<f64> {
        let mut total = 0.0;
        for stat in combo.components() {
            total += self.stats.get(*stat)?;
        }
        Some(round_to(total, 1))
    }

    /// Labelled values in report order: base stats, then combinations
    pub fn entries(&self) -> Vec<(String, f64)> {
        let base = self.stats.iter().map(|(s, v)| (s.code().to_string(), v));
        let combos = Combo::ALL
            .iter()
            .filter_map(|c| self.combo(*c).map(|v| (c.label().to_string(), v)));
        base.chain(combos).collect()
    }
}

/// Add each stat's delta to the base line.
///
/// Stats without a delta pass through unchanged. Results are rounded to 1
/// decimal.
pub fn compose(base: &StatLine, deltas: &StatLine) -> ProjectedLine {
    let adjusted: StatLine = base
        .iter()
        .map(|(stat, value)| match deltas.get(stat) {
            Some(delta) => (stat, value + delta),
            None => (stat, value),
        })
        .collect();
    ProjectedLine::new(&adjusted)
}
