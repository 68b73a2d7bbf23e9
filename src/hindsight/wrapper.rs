//! Wrapping goal-conditioned environments.
use super::goal::GoalSpace;
use super::observation::{Observation, Trajectory};
use super::relabel::{relabel, RelabelError};
use crate::tree::{ArrayTree, TreeError};
use crate::Prng;
use ndarray::ArrayD;

/// An environment that pursues an explicit goal.
///
/// The environment owns its state; observations are environment-specific trees.
pub trait GoalEnvironment {
    type Goals: GoalSpace;

    /// Start a new episode, returning the initial raw observation.
    fn reset(&mut self, rng: &mut Prng) -> ArrayTree;

    /// Take a step, returning the raw observation, the reward and whether the episode is done.
    fn step(&mut self, action: &ArrayD<f64>, rng: &mut Prng) -> (ArrayTree, f64, bool);

    /// The goal reached by the current state.
    fn achieved_goal(&self) -> ArrayTree;

    /// The goal of the current episode.
    fn desired_goal(&self) -> ArrayTree;

    fn goal_space(&self) -> &Self::Goals;
}

impl<E: GoalEnvironment + ?Sized> GoalEnvironment for Box<E> {
    type Goals = E::Goals;

    fn reset(&mut self, rng: &mut Prng) -> ArrayTree {
        E::reset(self, rng)
    }
    fn step(&mut self, action: &ArrayD<f64>, rng: &mut Prng) -> (ArrayTree, f64, bool) {
        E::step(self, action, rng)
    }
    fn achieved_goal(&self) -> ArrayTree {
        E::achieved_goal(self)
    }
    fn desired_goal(&self) -> ArrayTree {
        E::desired_goal(self)
    }
    fn goal_space(&self) -> &Self::Goals {
        E::goal_space(self)
    }
}

/// Wraps a [`GoalEnvironment`] so that it produces [`Observation`]s.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HindsightWrapper<E> {
    pub inner: E,
}

impl<E: GoalEnvironment> HindsightWrapper<E> {
    pub const fn new(inner: E) -> Self {
        Self { inner }
    }

    fn observe(&self, observation: ArrayTree) -> Observation {
        Observation::new(
            observation,
            self.inner.achieved_goal(),
            self.inner.desired_goal(),
        )
    }

    pub fn reset(&mut self, rng: &mut Prng) -> Observation {
        let observation = self.inner.reset(rng);
        self.observe(observation)
    }

    pub fn step(&mut self, action: &ArrayD<f64>, rng: &mut Prng) -> (Observation, f64, bool) {
        let (observation, reward, terminal) = self.inner.step(action, rng);
        (self.observe(observation), reward, terminal)
    }

    #[inline]
    pub fn success(&self, achieved: &ArrayTree, desired: &ArrayTree) -> Result<bool, TreeError> {
        self.inner.goal_space().success(achieved, desired)
    }

    /// Whether the current state satisfies the current goal.
    pub fn is_success(&self) -> Result<bool, TreeError> {
        self.success(&self.inner.achieved_goal(), &self.inner.desired_goal())
    }

    /// Relabel a trajectory collected from this environment.
    pub fn relabel(&self, trajectory: &Trajectory) -> Result<Trajectory, RelabelError> {
        relabel(trajectory, self.inner.goal_space())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{LineEnv, ReachEnv};
    use super::*;
    use ndarray::{arr1, Array1};
    use rand::SeedableRng;

    #[test]
    fn line_reset_observation() {
        let mut env = HindsightWrapper::new(LineEnv::new(0.45));
        let mut rng = Prng::seed_from_u64(0);
        let obs = env.reset(&mut rng);
        assert_eq!(obs.achieved_goal, ArrayTree::scalar(0.0));
        assert_eq!(obs.desired_goal, ArrayTree::scalar(0.45));
        assert_eq!(obs.observation, ArrayTree::from_vec(vec![0.0, 0.0]));
    }

    #[test]
    fn line_step_updates_achieved_goal() {
        let mut env = HindsightWrapper::new(LineEnv::new(0.45));
        let mut rng = Prng::seed_from_u64(0);
        env.reset(&mut rng);
        let (obs, reward, terminal) = env.step(&arr1(&[1.0]).into_dyn(), &mut rng);
        assert_eq!(obs.achieved_goal, ArrayTree::scalar(0.1));
        assert_eq!(obs.desired_goal, ArrayTree::scalar(0.45));
        assert_eq!(reward, -1.0);
        assert!(!terminal);
        assert!(!env.is_success().unwrap());
    }

    #[test]
    fn line_reaches_goal() {
        let mut env = HindsightWrapper::new(LineEnv::new(0.3));
        let mut rng = Prng::seed_from_u64(0);
        env.reset(&mut rng);
        let action = arr1(&[1.0]).into_dyn();
        let mut terminal = false;
        for _ in 0..3 {
            terminal = env.step(&action, &mut rng).2;
        }
        assert!(terminal);
        assert!(env.is_success().unwrap());
    }

    #[test]
    fn reach_success_uses_composite_goal() {
        let mut env = HindsightWrapper::new(ReachEnv::new([0.3, 0.0, 0.0]));
        let mut rng = Prng::seed_from_u64(0);
        let obs = env.reset(&mut rng);
        assert!(!env
            .success(&obs.achieved_goal, &obs.desired_goal)
            .unwrap());
        assert!(env
            .success(&obs.achieved_goal, &obs.achieved_goal)
            .unwrap());
        let (obs, _, _) = env.step(&Array1::from(vec![1.0, 0.0, 0.0]).into_dyn(), &mut rng);
        assert_eq!(
            obs.achieved_goal.field("gripper"),
            Some(&ArrayTree::from_vec(vec![0.1, 0.0, 0.0]))
        );
    }
}
