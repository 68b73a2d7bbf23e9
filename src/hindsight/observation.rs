//! Goal-conditioned observations and episode trajectories.
use crate::tree::{self, ArrayTree, Key, Tree, TreeError};
use ndarray::{ArrayView1, Ix1};

/// Field name of the raw environment observation.
pub const OBSERVATION: &str = "observation";
/// Field name of the goal the environment has actually reached.
pub const ACHIEVED_GOAL: &str = "achieved_goal";
/// Field name of the goal the agent is asked to reach.
pub const DESIRED_GOAL: &str = "desired_goal";

const OBSERVATION_FIELDS: [&str; 3] = [OBSERVATION, ACHIEVED_GOAL, DESIRED_GOAL];

/// A goal-conditioned observation.
///
/// Each part is an [`ArrayTree`]; the parts may carry leading batch or time axes
/// (as in the observations of a [`Trajectory`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Environment-specific raw state.
    pub observation: ArrayTree,
    pub achieved_goal: ArrayTree,
    pub desired_goal: ArrayTree,
}

impl Observation {
    pub const fn new(
        observation: ArrayTree,
        achieved_goal: ArrayTree,
        desired_goal: ArrayTree,
    ) -> Self {
        Self {
            observation,
            achieved_goal,
            desired_goal,
        }
    }

    /// Replace the desired goal.
    #[must_use]
    pub fn with_desired_goal(self, desired_goal: ArrayTree) -> Self {
        Self {
            desired_goal,
            ..self
        }
    }

    /// A three-field record tree: `observation`, `achieved_goal`, `desired_goal`.
    pub fn into_tree(self) -> ArrayTree {
        Tree::record([
            (OBSERVATION, self.observation),
            (ACHIEVED_GOAL, self.achieved_goal),
            (DESIRED_GOAL, self.desired_goal),
        ])
    }

    pub fn to_tree(&self) -> ArrayTree {
        self.clone().into_tree()
    }

    pub fn try_from_tree(tree: ArrayTree) -> Result<Self, TreeError> {
        let [observation, achieved_goal, desired_goal] = tree.into_record(OBSERVATION_FIELDS)?;
        Ok(Self::new(observation, achieved_goal, desired_goal))
    }

    /// Apply `key` to every part.
    pub fn get(&self, key: &Key) -> Result<Self, TreeError> {
        Ok(Self::new(
            self.observation.get(key)?,
            self.achieved_goal.get(key)?,
            self.desired_goal.get(key)?,
        ))
    }
}

/// Field names of a trajectory record tree.
pub const O1: &str = "o1";
pub const ACTION: &str = "a";
pub const REWARD: &str = "r";
pub const O2: &str = "o2";
pub const TERMINAL: &str = "t";

const TRAJECTORY_FIELDS: [&str; 5] = [O1, ACTION, REWARD, O2, TERMINAL];

/// A single environment transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Observation before the action.
    pub o1: Observation,
    /// The action taken.
    pub a: ArrayTree,
    /// Reward for this transition.
    pub r: f64,
    /// Observation after the action.
    pub o2: Observation,
    /// Whether the transition ended the episode.
    pub t: bool,
}

impl Step {
    fn into_tree(self) -> ArrayTree {
        Tree::record([
            (O1, self.o1.into_tree()),
            (ACTION, self.a),
            (REWARD, ArrayTree::scalar(self.r)),
            (O2, self.o2.into_tree()),
            (TERMINAL, ArrayTree::scalar(if self.t { 1.0 } else { 0.0 })),
        ])
    }
}

/// The transitions of one episode; every leaf has a leading time axis.
///
/// Terminal flags are stored as `0.0` / `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    o1: Observation,
    a: ArrayTree,
    r: ArrayTree,
    o2: Observation,
    t: ArrayTree,
    len: usize,
}

impl Trajectory {
    /// Stack a sequence of steps into a trajectory.
    pub fn from_steps<I: IntoIterator<Item = Step>>(steps: I) -> Result<Self, TreeError> {
        let samples: Vec<_> = steps.into_iter().map(Step::into_tree).collect();
        Self::try_from_tree(tree::stack(&samples)?)
    }

    /// Interpret a record tree with fields `o1 a r o2 t` as a trajectory.
    ///
    /// `o1` and `o2` must be observation records, `r` and `t` must be 1-dimensional leaves
    /// and every leaf must share the same leading (time) axis length.
    pub fn try_from_tree(tree: ArrayTree) -> Result<Self, TreeError> {
        let len = tree.batch_len()?;
        let [o1, a, r, o2, t] = tree.into_record(TRAJECTORY_FIELDS)?;
        for (name, flat) in [(REWARD, &r), (TERMINAL, &t)] {
            match flat.as_leaf() {
                Some(leaf) if leaf.ndim() == 1 => {}
                _ => {
                    return Err(TreeError::Shape {
                        path: field_path(name),
                        reason: "expected a 1-dimensional leaf".into(),
                    })
                }
            }
        }
        Ok(Self {
            o1: Observation::try_from_tree(o1)?,
            a,
            r,
            o2: Observation::try_from_tree(o2)?,
            t,
            len,
        })
    }

    /// A record tree with fields `o1 a r o2 t`.
    pub fn into_tree(self) -> ArrayTree {
        Tree::record([
            (O1, self.o1.into_tree()),
            (ACTION, self.a),
            (REWARD, self.r),
            (O2, self.o2.into_tree()),
            (TERMINAL, self.t),
        ])
    }

    /// Number of steps.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Observations before each action.
    #[inline]
    pub const fn o1(&self) -> &Observation {
        &self.o1
    }

    /// Observations after each action.
    #[inline]
    pub const fn o2(&self) -> &Observation {
        &self.o2
    }

    #[inline]
    pub const fn actions(&self) -> &ArrayTree {
        &self.a
    }

    pub fn rewards(&self) -> ArrayView1<f64> {
        flat_view(&self.r)
    }

    /// Terminal flags (as `0.0` / `1.0`).
    pub fn terminal_flags(&self) -> ArrayView1<f64> {
        flat_view(&self.t)
    }

    pub fn terminals(&self) -> Vec<bool> {
        self.terminal_flags().iter().map(|&t| t != 0.0).collect()
    }

    /// Index of the first terminal step, if any.
    pub fn first_terminal(&self) -> Option<usize> {
        self.terminal_flags().iter().position(|&t| t != 0.0)
    }

    /// Apply `key` to every field, returning the raw tree.
    ///
    /// Use [`Trajectory::select`] to keep the result as a trajectory.
    pub fn get(&self, key: &Key) -> Result<ArrayTree, TreeError> {
        self.clone().into_tree().get(key)
    }

    /// Select a subset of steps.
    ///
    /// [`Key::Index`] is rejected because it removes the time axis; use [`Trajectory::step`].
    pub fn select(&self, key: &Key) -> Result<Self, TreeError> {
        if let Key::Index(_) = key {
            return Err(TreeError::Shape {
                path: tree::TreePath::root(),
                reason: "selecting a single step removes the time axis".into(),
            });
        }
        Ok(Self {
            o1: self.o1.get(key)?,
            a: self.a.get(key)?,
            r: self.r.get(key)?,
            o2: self.o2.get(key)?,
            t: self.t.get(key)?,
            len: match key {
                Key::Indices(indices) => indices.len(),
                _ => self.r.get(key)?.batch_len()?,
            },
        })
    }

    /// The first `len` steps (or all steps if there are fewer).
    pub fn truncate(&self, len: usize) -> Result<Self, TreeError> {
        self.select(&Key::prefix(len))
    }

    /// A single step.
    pub fn step(&self, index: usize) -> Result<Step, TreeError> {
        if index >= self.len {
            return Err(TreeError::IndexOutOfBounds {
                path: tree::TreePath::root(),
                index: isize::try_from(index).unwrap_or(isize::MAX),
                len: self.len,
            });
        }
        let key = Key::from(index);
        Ok(Step {
            o1: self.o1.get(&key)?,
            a: self.a.get(&key)?,
            r: self.rewards()[index],
            o2: self.o2.get(&key)?,
            t: self.terminal_flags()[index] != 0.0,
        })
    }

    /// Mutable parts used by relabeling: `(o1, r, o2, t)`.
    pub(crate) fn parts_mut(
        &mut self,
    ) -> (
        &mut Observation,
        &mut ArrayTree,
        &mut Observation,
        &mut ArrayTree,
    ) {
        (&mut self.o1, &mut self.r, &mut self.o2, &mut self.t)
    }
}

fn field_path(name: &'static str) -> tree::TreePath {
    let mut path = tree::TreePath::root();
    path.push(tree::PathElem::Name(name.into()));
    path
}

/// View of a leaf known to be 1-dimensional.
fn flat_view(flat: &ArrayTree) -> ArrayView1<f64> {
    flat.as_leaf()
        .and_then(|leaf| leaf.view().into_dimensionality::<Ix1>().ok())
        .unwrap_or_else(|| ArrayView1::from(&[] as &[f64]))
}
