//! Flattening observation trees into feature vectors.
use crate::hindsight::observation::{DESIRED_GOAL, OBSERVATION};
use crate::tree::{ArrayTree, Child, PathElem, Shape, ShapeTree, Tree, TreeError, TreePath};
use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn, Slice};
use num_traits::{Float, NumCast};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ops::Range;
use thiserror::Error;

/// Which top-level fields of a tree are flattened, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSelection {
    /// The whole tree.
    All,
    /// The named top-level fields, in the given order.
    Fields(Vec<Cow<'static, str>>),
}

impl FieldSelection {
    pub fn fields<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Cow<'static, str>>,
    {
        Self::Fields(names.into_iter().map(Into::into).collect())
    }
}

/// The raw observation and the desired goal; the achieved goal is left out.
impl Default for FieldSelection {
    fn default() -> Self {
        Self::fields([OBSERVATION, DESIRED_GOAL])
    }
}

/// Location of one leaf within the flat feature vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSlot {
    /// Path of the leaf from the root of the flattened tree.
    pub path: TreePath,
    /// Shape of the leaf.
    pub shape: Shape,
    /// Feature indices holding the leaf values (row-major).
    pub range: Range<usize>,
}

impl LeafSlot {
    fn check_shape(&self, shape: &[usize]) -> Result<(), FlattenError> {
        if shape == self.shape.as_slice() {
            Ok(())
        } else {
            Err(FlattenError::LeafShapeMismatch {
                path: self.path.clone(),
                expected: self.shape.clone(),
                found: Shape::from_slice(shape),
            })
        }
    }
}

/// Error flattening a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlattenError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("leaf at {path} has shape {found:?} but its slot has shape {expected:?}")]
    LeafShapeMismatch {
        path: TreePath,
        expected: Shape,
        found: Shape,
    },
    #[error("expected {expected} features but got {found}")]
    LengthMismatch { expected: usize, found: usize },
}

#[derive(Debug, Clone, PartialEq)]
struct Part {
    name: Option<Cow<'static, str>>,
    shape: ShapeTree,
}

impl Part {
    fn prefix(&self) -> TreePath {
        let mut path = TreePath::root();
        if let Some(name) = &self.name {
            path.push(PathElem::Name(name.clone()));
        }
        path
    }
}

/// Flattens trees of a fixed structure into feature vectors with a fixed layout.
///
/// Selected fields are visited in selection order; within a field, leaves are visited
/// depth-first in child order. Each leaf occupies a contiguous [`LeafSlot`].
#[derive(Debug, Clone, PartialEq)]
pub struct Flattener {
    selection: FieldSelection,
    /// Structure of the whole template, including unselected fields.
    structure: ShapeTree,
    parts: Vec<Part>,
    slots: Vec<LeafSlot>,
    num_features: usize,
}

#[inline]
fn cast<F: Float>(x: f64) -> F {
    <F as NumCast>::from(x).unwrap_or_else(F::nan)
}

impl Flattener {
    /// Build the layout from a single (un-batched) sample.
    pub fn new(template: &ArrayTree, selection: FieldSelection) -> Result<Self, FlattenError> {
        let parts: Vec<Part> = select(template, &selection)?
            .into_iter()
            .map(|(name, tree)| Part {
                name,
                shape: tree.shape(),
            })
            .collect();

        let mut slots = Vec::new();
        let mut offset = 0;
        for part in &parts {
            let prefix = part.prefix();
            for (path, shape) in part.shape.leaves_with_paths() {
                let size: usize = shape.iter().product();
                slots.push(LeafSlot {
                    path: prefix.join(&path),
                    shape: shape.clone(),
                    range: offset..offset + size,
                });
                offset += size;
            }
        }

        Ok(Self {
            selection,
            structure: template.shape(),
            parts,
            slots,
            num_features: offset,
        })
    }

    #[inline]
    pub const fn num_features(&self) -> usize {
        self.num_features
    }

    /// The offset table: one slot per flattened leaf, in layout order.
    #[inline]
    pub fn slots(&self) -> &[LeafSlot] {
        &self.slots
    }

    #[inline]
    pub const fn selection(&self) -> &FieldSelection {
        &self.selection
    }

    /// Check a tree against the layout, returning its selected leaves paired with their slots.
    ///
    /// The whole tree must match the template structure, not only the selected fields.
    fn paired_leaves<'a>(
        &'a self,
        tree: &'a ArrayTree,
    ) -> Result<Vec<(&'a LeafSlot, &'a ArrayD<f64>)>, FlattenError> {
        self.structure.ensure_same_structure(tree)?;
        let mut leaves = Vec::with_capacity(self.slots.len());
        for (_, subtree) in select(tree, &self.selection)? {
            leaves.extend(subtree.leaves());
        }
        Ok(self.slots.iter().zip(leaves).collect())
    }

    /// Feature vector of a single sample.
    pub fn features<F: Float>(&self, tree: &ArrayTree) -> Result<Array1<F>, FlattenError> {
        let mut out = Array1::zeros(self.num_features);
        // Freshly allocated so contiguous
        if let Some(slice) = out.as_slice_mut() {
            self.features_out(tree, slice)?;
        }
        Ok(out)
    }

    /// Write the features of a single sample into the front of `out`.
    ///
    /// Returns the remaining (unwritten) part of `out`.
    pub fn features_out<'a, F: Float>(
        &self,
        tree: &ArrayTree,
        out: &'a mut [F],
    ) -> Result<&'a mut [F], FlattenError> {
        if out.len() < self.num_features {
            return Err(FlattenError::LengthMismatch {
                expected: self.num_features,
                found: out.len(),
            });
        }
        let (features, rest) = out.split_at_mut(self.num_features);
        for (slot, leaf) in self.paired_leaves(tree)? {
            slot.check_shape(leaf.shape())?;
            for (o, &x) in features[slot.range.clone()].iter_mut().zip(leaf) {
                *o = cast(x);
            }
        }
        Ok(rest)
    }

    /// Feature matrix with one row per sample.
    pub fn batch_features<'a, F, I>(&self, samples: I) -> Result<Array2<F>, FlattenError>
    where
        F: Float,
        I: IntoIterator<Item = &'a ArrayTree>,
    {
        let mut data = Vec::new();
        let mut num_rows = 0;
        for sample in samples {
            let start = data.len();
            data.resize(start + self.num_features, F::zero());
            self.features_out(sample, &mut data[start..])?;
            num_rows += 1;
        }
        let found = data.len();
        Array2::from_shape_vec((num_rows, self.num_features), data).map_err(|_| {
            FlattenError::LengthMismatch {
                expected: num_rows * self.num_features,
                found,
            }
        })
    }

    /// Feature matrix of a tree whose leaves carry a leading batch axis, one row per index.
    pub fn stacked_features<F: Float>(&self, tree: &ArrayTree) -> Result<Array2<F>, FlattenError> {
        let leaves = self.paired_leaves(tree)?;
        let mut num_rows = None;
        for (slot, leaf) in &leaves {
            let len = *leaf
                .shape()
                .first()
                .ok_or_else(|| TreeError::IndexOnScalar {
                    path: slot.path.clone(),
                })?;
            match num_rows {
                None => num_rows = Some(len),
                Some(n) if n != len => {
                    return Err(TreeError::shape(
                        &slot.path,
                        format!("leading axis of length {} but expected {}", len, n),
                    )
                    .into())
                }
                Some(_) => {}
            }
            slot.check_shape(&leaf.shape()[1..])?;
        }

        let mut out = Array2::zeros((num_rows.unwrap_or(0), self.num_features));
        for (slot, leaf) in leaves {
            for (mut row, sample) in out.rows_mut().into_iter().zip(leaf.axis_iter(Axis(0))) {
                let mut slot_view = row.slice_axis_mut(Axis(0), Slice::from(slot.range.clone()));
                for (o, &x) in slot_view.iter_mut().zip(&sample) {
                    *o = cast(x);
                }
            }
        }
        Ok(out)
    }

    /// Rebuild the selected part of a sample from its feature vector.
    ///
    /// With [`FieldSelection::All`] this is the whole tree, otherwise a record of the
    /// selected fields.
    pub fn unflatten<F: Float>(&self, features: &[F]) -> Result<ArrayTree, FlattenError> {
        if features.len() != self.num_features {
            return Err(FlattenError::LengthMismatch {
                expected: self.num_features,
                found: features.len(),
            });
        }
        let mut slots = self.slots.iter();
        let mut children = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            let node = part.shape.try_map(|path, shape| {
                let range = slots.next().map_or(0..0, |slot| slot.range.clone());
                let values = features[range]
                    .iter()
                    .map(|x| x.to_f64().unwrap_or(f64::NAN))
                    .collect();
                ArrayD::from_shape_vec(IxDyn(shape), values)
                    .map_err(|err| TreeError::shape(&part.prefix().join(path), err.to_string()))
            })?;
            children.push(Child {
                name: part.name.clone(),
                node,
            });
        }
        match (&self.selection, children.pop()) {
            (FieldSelection::All, Some(child)) => Ok(child.node),
            (_, last) => {
                children.extend(last);
                Ok(Tree::Branch(children))
            }
        }
    }
}

/// The selected top-level subtrees of `tree`, with their field names.
fn select<'a>(
    tree: &'a ArrayTree,
    selection: &FieldSelection,
) -> Result<Vec<(Option<Cow<'static, str>>, &'a ArrayTree)>, TreeError> {
    match selection {
        FieldSelection::All => Ok(vec![(None, tree)]),
        FieldSelection::Fields(names) => names
            .iter()
            .map(|name| Ok((Some(name.clone()), tree.try_field(name)?)))
            .collect(),
    }
}
