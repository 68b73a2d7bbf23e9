//! Collecting episodes from goal environments.
use crate::buffers::TrajectoryBuffer;
use crate::error::HindsightError;
use crate::hindsight::{GoalEnvironment, HindsightWrapper, Observation, Relabeler, Step, Trajectory};
use crate::logging::StatsLogger;
use crate::tree::{Tree, TreeError};
use crate::Prng;
use ndarray::{Array, ArrayD};
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use std::fmt;

/// Chooses actions from observations.
pub trait Actor {
    /// Choose an action.
    ///
    /// # Args
    /// * `observation` - The current observation.
    /// * `new_episode` - Whether this observation starts a new episode.
    fn act(&mut self, observation: &Observation, new_episode: bool) -> ArrayD<f64>;
}

impl<T: Actor + ?Sized> Actor for &'_ mut T {
    fn act(&mut self, observation: &Observation, new_episode: bool) -> ArrayD<f64> {
        T::act(self, observation, new_episode)
    }
}

impl<T: Actor + ?Sized> Actor for Box<T> {
    fn act(&mut self, observation: &Observation, new_episode: bool) -> ArrayD<f64> {
        T::act(self, observation, new_episode)
    }
}

/// An actor that samples each action dimension uniformly from `[low, high]`.
#[derive(Debug, Clone)]
pub struct RandomActor {
    dim: usize,
    distribution: Uniform<f64>,
    rng: Prng,
}

impl RandomActor {
    /// The bounds are swapped if `low > high`.
    ///
    /// # Panics
    /// If either bound is NaN or infinite.
    pub fn new(dim: usize, low: f64, high: f64, seed: u64) -> Self {
        assert!(
            low.is_finite() && high.is_finite(),
            "action bounds must be finite, got [{}, {}]",
            low,
            high
        );
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        Self {
            dim,
            distribution: Uniform::new_inclusive(low, high),
            rng: Prng::seed_from_u64(seed),
        }
    }
}

impl Actor for RandomActor {
    fn act(&mut self, _: &Observation, _: bool) -> ArrayD<f64> {
        let distribution = &self.distribution;
        let rng = &mut self.rng;
        Array::from_shape_simple_fn(self.dim, || distribution.sample(rng)).into_dyn()
    }
}

impl fmt::Display for RandomActor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RandomActor({})", self.dim)
    }
}

/// Run one episode of at most `max_steps` steps.
///
/// The episode ends at the first terminal step or at the step limit.
/// Fails with a shape error if `max_steps` is zero.
pub fn collect_episode<E, A>(
    env: &mut HindsightWrapper<E>,
    actor: &mut A,
    max_steps: usize,
    rng: &mut Prng,
) -> Result<Trajectory, TreeError>
where
    E: GoalEnvironment,
    A: Actor + ?Sized,
{
    let mut steps = Vec::with_capacity(max_steps);
    let mut observation = env.reset(rng);
    for i in 0..max_steps {
        let action = actor.act(&observation, i == 0);
        let (next, reward, terminal) = env.step(&action, rng);
        steps.push(Step {
            o1: observation,
            a: Tree::leaf(action),
            r: reward,
            o2: next.clone(),
            t: terminal,
        });
        if terminal {
            break;
        }
        observation = next;
    }
    Trajectory::from_steps(steps)
}

/// Summary of one collected episode.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub len: usize,
    pub total_reward: f64,
    /// Whether the final state satisfied the desired goal.
    pub success: bool,
    /// Length of the relabeled episode, if one was added.
    pub relabeled_len: Option<usize>,
}

/// Collects episodes into a buffer, adding a hindsight-relabeled copy of each.
#[derive(Debug)]
pub struct HindsightCollector<E, B> {
    pub env: HindsightWrapper<E>,
    pub buffer: B,
    pub max_episode_steps: usize,
    /// Whether to append the relabeled copy of each episode.
    pub relabel: bool,
    rng: Prng,
}

impl<E, B> HindsightCollector<E, B>
where
    E: GoalEnvironment,
    B: TrajectoryBuffer,
{
    pub fn new(env: E, buffer: B, max_episode_steps: usize, relabel: bool, seed: u64) -> Self {
        Self {
            env: HindsightWrapper::new(env),
            buffer,
            max_episode_steps,
            relabel,
            rng: Prng::seed_from_u64(seed),
        }
    }

    /// Collect one episode, append it (and its relabeled copy) to the buffer and log statistics.
    pub fn run_episode<A, L>(
        &mut self,
        actor: &mut A,
        logger: &mut L,
    ) -> Result<EpisodeSummary, HindsightError>
    where
        A: Actor + ?Sized,
        L: StatsLogger + ?Sized,
    {
        let trajectory =
            collect_episode(&mut self.env, actor, self.max_episode_steps, &mut self.rng)?;
        let success = self.env.is_success()?;

        let relabeled = if self.relabel {
            let relabeler = Relabeler::new(self.env.inner.goal_space());
            Some(relabeler.relabel_logged(&trajectory, logger)?.0)
        } else {
            None
        };

        let summary = EpisodeSummary {
            len: trajectory.len(),
            total_reward: trajectory.rewards().sum(),
            success,
            relabeled_len: relabeled.as_ref().map(Trajectory::len),
        };

        self.buffer.append(trajectory)?;
        if let Some(relabeled) = relabeled {
            self.buffer.append(relabeled)?;
        }

        #[allow(clippy::cast_precision_loss)]
        let len = summary.len as f64;
        logger.log_scalar("episode_len", len)?;
        logger.log_scalar("episode_reward", summary.total_reward)?;
        logger.log_scalar("episode_success", if success { 1.0 } else { 0.0 })?;
        Ok(summary)
    }

    /// Collect `num_episodes` episodes then flush the logger.
    pub fn run<A, L>(
        &mut self,
        num_episodes: usize,
        actor: &mut A,
        logger: &mut L,
    ) -> Result<Vec<EpisodeSummary>, HindsightError>
    where
        A: Actor + ?Sized,
        L: StatsLogger + ?Sized,
    {
        let summaries: Result<Vec<_>, _> = (0..num_episodes)
            .map(|_| self.run_episode(actor, logger))
            .collect();
        logger.flush();
        summaries
    }
}
