//! Indexing along the leading axis of every leaf.
use super::{ArrayTree, TreeError, TreePath};
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Axis, IxDyn, Slice};
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

/// An index applied uniformly to the leading axis of every leaf of an [`ArrayTree`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A single position; negative values count back from the end.
    ///
    /// Selecting with an index removes the leading axis.
    Index(isize),
    /// A half-open range of positions. Negative bounds count back from the end.
    /// `end: None` extends to the end of the axis. Bounds are clamped to the axis.
    Range { start: isize, end: Option<isize> },
    /// Gather the listed positions in order.
    Indices(Vec<usize>),
    /// Every position.
    Full,
}

impl Key {
    /// The last position along the leading axis.
    pub const LAST: Self = Self::Index(-1);

    /// A range of the first `len` positions.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn prefix(len: usize) -> Self {
        Self::Range {
            start: 0,
            end: Some(len as isize),
        }
    }

    /// Resolve against an axis of length `len`.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn resolve(&self, len: usize, path: &TreePath) -> Result<Resolved, TreeError> {
        let signed_len = len as isize;
        let out_of_bounds = |index: isize| TreeError::IndexOutOfBounds {
            path: path.clone(),
            index,
            len,
        };
        let clamp = |bound: isize| {
            let bound = if bound < 0 { bound + signed_len } else { bound };
            bound.clamp(0, signed_len) as usize
        };
        Ok(match self {
            Self::Index(index) => {
                let i = if *index < 0 { index + signed_len } else { *index };
                if i < 0 || i >= signed_len {
                    return Err(out_of_bounds(*index));
                }
                Resolved::Single(i as usize)
            }
            Self::Range { start, end } => {
                let start = clamp(*start);
                let end = end.map_or(len, clamp).max(start);
                Resolved::Span(start, end)
            }
            Self::Indices(indices) => {
                if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
                    return Err(out_of_bounds(bad as isize));
                }
                Resolved::Rows(indices.clone())
            }
            Self::Full => Resolved::Span(0, len),
        })
    }
}

impl From<usize> for Key {
    #[allow(clippy::cast_possible_wrap)]
    fn from(index: usize) -> Self {
        Self::Index(index as isize)
    }
}

impl From<isize> for Key {
    fn from(index: isize) -> Self {
        Self::Index(index)
    }
}

impl From<Range<usize>> for Key {
    #[allow(clippy::cast_possible_wrap)]
    fn from(range: Range<usize>) -> Self {
        Self::Range {
            start: range.start as isize,
            end: Some(range.end as isize),
        }
    }
}

impl From<RangeTo<usize>> for Key {
    fn from(range: RangeTo<usize>) -> Self {
        Self::prefix(range.end)
    }
}

impl From<RangeFrom<usize>> for Key {
    #[allow(clippy::cast_possible_wrap)]
    fn from(range: RangeFrom<usize>) -> Self {
        Self::Range {
            start: range.start as isize,
            end: None,
        }
    }
}

impl From<RangeFull> for Key {
    fn from(_: RangeFull) -> Self {
        Self::Full
    }
}

impl From<Vec<usize>> for Key {
    fn from(indices: Vec<usize>) -> Self {
        Self::Indices(indices)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolved {
    Single(usize),
    Span(usize, usize),
    Rows(Vec<usize>),
}

impl Resolved {
    /// Shape of the selection from a leaf of shape `shape`.
    fn selected_shape(&self, shape: &[usize]) -> Vec<usize> {
        let inner = &shape[1..];
        match self {
            Self::Single(_) => inner.to_vec(),
            Self::Span(start, end) => std::iter::once(end - start)
                .chain(inner.iter().copied())
                .collect(),
            Self::Rows(rows) => std::iter::once(rows.len())
                .chain(inner.iter().copied())
                .collect(),
        }
    }
}

fn leading_len(leaf: &ArrayD<f64>, path: &TreePath) -> Result<usize, TreeError> {
    leaf.shape()
        .first()
        .copied()
        .ok_or_else(|| TreeError::IndexOnScalar { path: path.clone() })
}

fn get_leaf(leaf: &ArrayD<f64>, key: &Key, path: &TreePath) -> Result<ArrayD<f64>, TreeError> {
    let len = leading_len(leaf, path)?;
    Ok(match key.resolve(len, path)? {
        Resolved::Single(i) => leaf.index_axis(Axis(0), i).to_owned(),
        Resolved::Span(start, end) => leaf
            .slice_axis(Axis(0), Slice::from(start..end))
            .to_owned(),
        Resolved::Rows(rows) => leaf.select(Axis(0), &rows),
    })
}

/// Broadcast `value` to `shape` or report why it cannot be.
fn broadcast_to<'a>(
    value: &'a ArrayD<f64>,
    shape: &[usize],
    path: &TreePath,
) -> Result<ArrayViewD<'a, f64>, TreeError> {
    value.broadcast(IxDyn(shape)).ok_or_else(|| {
        TreeError::shape(
            path,
            format!(
                "cannot broadcast value of shape {:?} to {:?}",
                value.shape(),
                shape
            ),
        )
    })
}

fn check_assign_leaf(
    leaf: &ArrayD<f64>,
    key: &Key,
    value: &ArrayD<f64>,
    path: &TreePath,
) -> Result<(), TreeError> {
    let len = leading_len(leaf, path)?;
    let target = key.resolve(len, path)?.selected_shape(leaf.shape());
    broadcast_to(value, &target, path).map(|_| ())
}

fn assign_leaf(
    leaf: &mut ArrayD<f64>,
    key: &Key,
    value: &ArrayD<f64>,
    path: &TreePath,
) -> Result<(), TreeError> {
    let len = leading_len(leaf, path)?;
    let resolved = key.resolve(len, path)?;
    let target = resolved.selected_shape(leaf.shape());
    let value = broadcast_to(value, &target, path)?;
    match resolved {
        Resolved::Single(i) => leaf.index_axis_mut(Axis(0), i).assign(&value),
        Resolved::Span(start, end) => {
            let mut view: ArrayViewMutD<f64> =
                leaf.slice_axis_mut(Axis(0), Slice::from(start..end));
            view.assign(&value);
        }
        Resolved::Rows(rows) => {
            for (j, &i) in rows.iter().enumerate() {
                leaf.index_axis_mut(Axis(0), i)
                    .assign(&value.index_axis(Axis(0), j));
            }
        }
    }
    Ok(())
}

impl ArrayTree {
    /// Apply `key` to the leading axis of every leaf.
    ///
    /// The result has the same structure as `self`.
    pub fn get(&self, key: &Key) -> Result<Self, TreeError> {
        self.try_map(|path, leaf| get_leaf(leaf, key, path))
    }

    /// Assign `value` into the `key` selection of every leaf.
    ///
    /// `value` must have the same structure as `self`; each of its leaves is broadcast to the
    /// shape of the corresponding selection. Every leaf is checked before anything is written,
    /// so on error `self` is unchanged.
    pub fn set(&mut self, key: &Key, value: &Self) -> Result<(), TreeError> {
        self.try_for_each_pair(value, |path, leaf, v| check_assign_leaf(leaf, key, v, path))?;
        self.try_zip_mut(value, |path, leaf, v| assign_leaf(leaf, key, v, path))
    }

    /// Write the scalar `value` into the `key` selection of every leaf.
    pub fn fill(&mut self, key: &Key, value: f64) -> Result<(), TreeError> {
        let value = self.map(|_| ndarray::arr0(value).into_dyn());
        self.set(key, &value)
    }
}
