//! Hindsight experience replay for goal-conditioned reinforcement learning.
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::for_kv_map)] // part of warn(clippy::all), specifically style?
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)] // also triggered by macro expansions
pub mod buffers;
pub mod config;
mod error;
pub mod features;
pub mod hindsight;
pub mod logging;
pub mod simulation;
pub mod tree;

pub use buffers::{EpisodeReplay, TrajectoryBuffer};
pub use config::CollectorConfig;
pub use error::HindsightError;
pub use features::{FieldSelection, Flattener};
pub use hindsight::{
    relabel, GoalEnvironment, GoalSpace, HindsightWrapper, Observation, Relabeler, Trajectory,
};
pub use simulation::{collect_episode, Actor, HindsightCollector};
pub use tree::{ArrayTree, Tree};

/// Pseudo-random number generator used throughout the crate.
pub type Prng = rand_chacha::ChaCha8Rng;
