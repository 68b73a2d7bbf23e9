//! Hindsight goal relabeling of whole episodes.
use super::goal::GoalSpace;
use super::observation::Trajectory;
use crate::logging::{LogError, StatsLogger};
use crate::tree::{ArrayTree, BinaryOp, Key, TreeError};
use thiserror::Error;

/// Error relabeling a trajectory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelabelError {
    #[error("cannot relabel an empty trajectory")]
    EmptyTrajectory,
    #[error("no terminal step in the relabeled trajectory of length {len}")]
    NoTerminalFound { len: usize },
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Log(#[from] LogError),
}

/// Relabel a trajectory with the goal it actually achieved.
///
/// The final achieved goal (`o2.achieved_goal` of the last step) becomes the desired goal of
/// every step in both `o1` and `o2`.
/// Rewards are replaced by the success flag `goals.success(achieved, final_achieved)` of each
/// step (`1.0` or `0.0`) and each terminal flag becomes `terminal OR success`.
/// The result is truncated after the first terminal step.
///
/// The input is not modified.
///
/// # Errors
/// * [`RelabelError::EmptyTrajectory`] if `trajectory` has no steps.
/// * [`RelabelError::NoTerminalFound`] if no step is terminal after relabeling;
///     this happens only if `goals.success` is not reflexive.
/// * [`RelabelError::Tree`] if the goals are malformed.
pub fn relabel<G: GoalSpace + ?Sized>(
    trajectory: &Trajectory,
    goals: &G,
) -> Result<Trajectory, RelabelError> {
    if trajectory.is_empty() {
        return Err(RelabelError::EmptyTrajectory);
    }
    let len = trajectory.len();
    let final_achieved = trajectory.o2().achieved_goal.get(&Key::LAST)?;

    let mut relabeled = trajectory.clone();
    let (o1, rewards, o2, terminals) = relabeled.parts_mut();
    o1.desired_goal.set(&Key::Full, &final_achieved)?;
    o2.desired_goal.set(&Key::Full, &final_achieved)?;

    let mut success = Vec::with_capacity(len);
    for i in 0..len {
        let achieved = o2.achieved_goal.get(&Key::from(i))?;
        success.push(if goals.success(&achieved, &final_achieved)? {
            1.0
        } else {
            0.0
        });
    }
    let success = ArrayTree::from_vec(success);
    *terminals = terminals.combine(&success, BinaryOp::Or)?;
    *rewards = success;

    let last = relabeled
        .first_terminal()
        .ok_or(RelabelError::NoTerminalFound { len })?;
    Ok(relabeled.truncate(last + 1)?)
}

/// Statistics of a single relabeling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RelabelSummary {
    pub original_len: usize,
    pub relabeled_len: usize,
    /// Number of steps of the relabeled trajectory with a success reward.
    pub num_successes: usize,
}

impl RelabelSummary {
    pub fn new(original: &Trajectory, relabeled: &Trajectory) -> Self {
        Self {
            original_len: original.len(),
            relabeled_len: relabeled.len(),
            num_successes: relabeled.rewards().iter().filter(|&&r| r != 0.0).count(),
        }
    }

    /// Fraction of the original steps discarded by truncation.
    #[allow(clippy::cast_precision_loss)]
    pub fn truncated_fraction(&self) -> f64 {
        if self.original_len == 0 {
            return 0.0;
        }
        (self.original_len - self.relabeled_len) as f64 / self.original_len as f64
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn log<L: StatsLogger + ?Sized>(&self, logger: &mut L) -> Result<(), LogError> {
        logger.log_counter_increment("relabel_count", 1)?;
        logger.log_scalar("relabel_len", self.relabeled_len as f64)?;
        logger.log_scalar("relabel_truncated_frac", self.truncated_fraction())?;
        logger.log_counter_increment("relabel_successes", self.num_successes as u64)
    }
}

/// Relabels trajectories using a fixed goal space.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Relabeler<G> {
    pub goals: G,
}

impl<G: GoalSpace> Relabeler<G> {
    pub const fn new(goals: G) -> Self {
        Self { goals }
    }

    /// See [`relabel`].
    #[inline]
    pub fn relabel(&self, trajectory: &Trajectory) -> Result<Trajectory, RelabelError> {
        relabel(trajectory, &self.goals)
    }

    /// Relabel and log a [`RelabelSummary`].
    pub fn relabel_logged<L: StatsLogger + ?Sized>(
        &self,
        trajectory: &Trajectory,
        logger: &mut L,
    ) -> Result<(Trajectory, RelabelSummary), RelabelError> {
        let relabeled = self.relabel(trajectory)?;
        let summary = RelabelSummary::new(trajectory, &relabeled);
        summary.log(logger)?;
        Ok((relabeled, summary))
    }
}
