//! Hindsight experience replay: goal-conditioned observations and trajectory relabeling.
pub mod goal;
pub mod observation;
mod relabel;
#[cfg(test)]
pub mod testing;
mod wrapper;

pub use goal::{CompositeGoal, Criterion, GoalConfig, GoalSpace, ScalarGoal};
pub use observation::{Observation, Step, Trajectory};
pub use relabel::{relabel, RelabelError, RelabelSummary, Relabeler};
pub use wrapper::{GoalEnvironment, HindsightWrapper};
