//! Projection requests and model inference
//!
//! Runs the projection pipeline for a player, applies saved regression
//! models and formats the results.

pub mod inference;
pub mod pipeline;
pub mod report;

pub use inference::{predict_next_game, Predictor, StatPrediction};
pub use pipeline::{find_player, player_games, project, Analysis};
