//! Goal success criteria
use crate::tree::{ArrayTree, BinaryOp, TreeError, TreePath};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A goal space: decides whether an achieved goal satisfies a desired goal.
///
/// Both goals are single (un-batched) goal values.
pub trait GoalSpace {
    fn success(&self, achieved: &ArrayTree, desired: &ArrayTree) -> Result<bool, TreeError>;
}

impl<G: GoalSpace + ?Sized> GoalSpace for &'_ G {
    #[inline]
    fn success(&self, achieved: &ArrayTree, desired: &ArrayTree) -> Result<bool, TreeError> {
        G::success(self, achieved, desired)
    }
}

impl<G: GoalSpace + ?Sized> GoalSpace for Box<G> {
    #[inline]
    fn success(&self, achieved: &ArrayTree, desired: &ArrayTree) -> Result<bool, TreeError> {
        G::success(self, achieved, desired)
    }
}

/// How a scalar achieved goal is compared with the desired goal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criterion {
    /// `|achieved - desired| <= tolerance`
    Within,
    /// `achieved >= desired - tolerance`
    AtLeast,
}

/// A goal that is a single number, like a target position on a line.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarGoal {
    pub tolerance: f64,
    pub criterion: Criterion,
}

impl ScalarGoal {
    /// Success when the achieved value exactly equals the desired value.
    #[must_use]
    pub const fn exact() -> Self {
        Self {
            tolerance: 0.0,
            criterion: Criterion::Within,
        }
    }

    /// Success when the achieved value reaches at least the desired value.
    #[must_use]
    pub const fn at_least() -> Self {
        Self {
            tolerance: 0.0,
            criterion: Criterion::AtLeast,
        }
    }
}

impl Default for ScalarGoal {
    fn default() -> Self {
        Self::exact()
    }
}

fn scalar_value(goal: &ArrayTree) -> Result<f64, TreeError> {
    match goal.as_leaf() {
        Some(leaf) if leaf.len() == 1 => Ok(leaf.sum()),
        Some(leaf) => Err(TreeError::shape(
            &TreePath::root(),
            format!("scalar goal has shape {:?}", leaf.shape()),
        )),
        None => Err(TreeError::StructureMismatch {
            path: TreePath::root(),
            expected: crate::tree::NodeKind::Leaf,
            found: goal.kind(),
        }),
    }
}

impl GoalSpace for ScalarGoal {
    fn success(&self, achieved: &ArrayTree, desired: &ArrayTree) -> Result<bool, TreeError> {
        let achieved = scalar_value(achieved)?;
        let desired = scalar_value(desired)?;
        Ok(match self.criterion {
            Criterion::Within => (achieved - desired).abs() <= self.tolerance,
            Criterion::AtLeast => achieved >= desired - self.tolerance,
        })
    }
}

/// A goal made of named sub-goal positions, for example a gripper and a block position.
///
/// Succeeds when every named sub-goal is strictly within `geofence` (Euclidean distance)
/// of its desired position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeGoal {
    pub fields: Vec<Cow<'static, str>>,
    pub geofence: f64,
}

impl CompositeGoal {
    pub fn new<I, N>(fields: I, geofence: f64) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Cow<'static, str>>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            geofence,
        }
    }

    /// Euclidean distance between the achieved and desired values of `field`.
    pub fn distance(
        &self,
        field: &str,
        achieved: &ArrayTree,
        desired: &ArrayTree,
    ) -> Result<f64, TreeError> {
        let diff = achieved
            .try_field(field)?
            .combine(desired.try_field(field)?, BinaryOp::Sub)?;
        Ok(diff
            .leaves()
            .into_iter()
            .flat_map(|leaf| leaf.iter())
            .map(|x| x * x)
            .sum::<f64>()
            .sqrt())
    }
}

impl Default for CompositeGoal {
    fn default() -> Self {
        Self::new(["gripper", "block"], 0.1)
    }
}

impl GoalSpace for CompositeGoal {
    fn success(&self, achieved: &ArrayTree, desired: &ArrayTree) -> Result<bool, TreeError> {
        for field in &self.fields {
            if self.distance(field, achieved, desired)? >= self.geofence {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Configuration selecting a goal space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GoalConfig {
    Scalar(ScalarGoal),
    Composite(CompositeGoal),
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self::Scalar(ScalarGoal::default())
    }
}

impl GoalSpace for GoalConfig {
    fn success(&self, achieved: &ArrayTree, desired: &ArrayTree) -> Result<bool, TreeError> {
        match self {
            Self::Scalar(goal) => goal.success(achieved, desired),
            Self::Composite(goal) => goal.success(achieved, desired),
        }
    }
}
