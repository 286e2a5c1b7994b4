pub mod data;
pub mod live_scores;
pub mod scoring_period;
pub mod stats;
