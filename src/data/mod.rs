//! Data access
//!
//! The stats provider contract, the stats.nba.com client, and game log CSV files.

pub mod csv_io;
pub mod memory;
pub mod nba_stats;
pub mod source;
pub mod teams;

pub use memory::InMemorySource;
pub use nba_stats::NbaStatsClient;
pub use source::StatsSource;
