//! Leaf-wise binary operations.
use super::{ArrayTree, TreeError, TreePath};
use ndarray::{ArrayD, IxDyn, Zip};
use serde::{Deserialize, Serialize};

/// Elementwise binary operation on `f64` leaves.
///
/// Logical operations treat any non-zero value as true and produce `0.0` or `1.0`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Add,
    Sub,
    Mul,
    Max,
    Min,
}

impl BinaryOp {
    #[inline]
    #[must_use]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Or => bool_value(a != 0.0 || b != 0.0),
            Self::And => bool_value(a != 0.0 && b != 0.0),
            #[allow(clippy::float_cmp)]
            Self::Eq => bool_value(a == b),
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Max => a.max(b),
            Self::Min => a.min(b),
        }
    }
}

#[inline]
const fn bool_value(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Shape of two co-broadcast arrays, following the trailing-axis alignment rule.
fn co_broadcast(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let (pad_a, pad_b) = (ndim - a.len(), ndim - b.len());
    (0..ndim)
        .map(|i| {
            let da = if i < pad_a { 1 } else { a[i - pad_a] };
            let db = if i < pad_b { 1 } else { b[i - pad_b] };
            match (da, db) {
                (x, y) if x == y => Some(x),
                (1, y) => Some(y),
                (x, 1) => Some(x),
                _ => None,
            }
        })
        .collect()
}

fn zip_leaf<F>(
    a: &ArrayD<f64>,
    b: &ArrayD<f64>,
    f: &F,
    path: &TreePath,
) -> Result<ArrayD<f64>, TreeError>
where
    F: Fn(f64, f64) -> f64,
{
    let incompatible = || {
        TreeError::shape(
            path,
            format!(
                "cannot broadcast shapes {:?} and {:?} together",
                a.shape(),
                b.shape()
            ),
        )
    };
    let shape = co_broadcast(a.shape(), b.shape()).ok_or_else(incompatible)?;
    let a = a.broadcast(IxDyn(&shape)).ok_or_else(incompatible)?;
    let b = b.broadcast(IxDyn(&shape)).ok_or_else(incompatible)?;
    Ok(Zip::from(a).and(b).map_collect(|&x, &y| f(x, y)))
}

impl ArrayTree {
    /// Apply `op` elementwise to the paired leaves of `self` and `other`.
    ///
    /// Both trees must have the same structure; paired leaves are broadcast together.
    pub fn combine(&self, other: &Self, op: BinaryOp) -> Result<Self, TreeError> {
        self.zip_with(other, |a, b| op.apply(a, b))
    }

    /// Apply a closure elementwise to the paired leaves of `self` and `other`.
    pub fn zip_with<F>(&self, other: &Self, f: F) -> Result<Self, TreeError>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.try_zip_with(other, |path, a, b| zip_leaf(a, b, &f, path))
    }
}
