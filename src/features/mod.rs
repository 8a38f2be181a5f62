//! Projection and regression features
//!
//! Recent-form weighting, league rankings, opponent matchup deltas and the
//! rolling averages consumed by the regression models.

pub mod matchup;
pub mod projection;
pub mod rankings;
pub mod rolling;
pub mod weighting;

pub use matchup::{estimate_matchup_delta, MatchupDelta};
pub use projection::{compose, Combo, ProjectedLine};
pub use rankings::{opponent_profile, LeagueRankings, OpponentProfile, RankingsCache};
pub use rolling::{preprocess, FeatureTable};
pub use weighting::{weighted_average, WeightedLine};
