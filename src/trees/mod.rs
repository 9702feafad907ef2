/// Single randomized tree
pub mod classifier;
pub mod node;
pub mod params;
/// Candidate generation and scoring
pub mod split;
/// Task partitions and per-task count tables
pub mod task_split;
