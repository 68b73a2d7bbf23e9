//! Tree-structured containers of numeric arrays.
//!
//! A [`Tree`] mirrors a fixed nesting of named or positional fields.
//! Terminal positions are [`Tree::Leaf`] values (usually [`ndarray`] arrays),
//! every other position is a [`Tree::Branch`] of ordered children.
//! The *structure* of a tree is its shape of branches: kind, arity and child names at every
//! level, independent of what the leaves contain.
mod key;
mod ops;
mod shape;

pub use key::Key;
pub use ops::BinaryOp;
pub use shape::{allocate, stack, zeros_like, Shape, ShapeTree};

use ndarray::{arr0, Array1, ArrayD};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// A tree whose leaves are dynamic-dimensional `f64` arrays.
///
/// The first axis of every leaf is treated as a batch (or time) axis by [`Key`] operations.
pub type ArrayTree = Tree<ArrayD<f64>>;

/// An ordered tree with values of type `T` at the leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tree<T> {
    /// A terminal value.
    Leaf(T),
    /// An ordered, fixed-arity sequence of children.
    Branch(Vec<Child<T>>),
}

/// A child of a [`Tree::Branch`]; optionally addressable by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child<T> {
    pub name: Option<Cow<'static, str>>,
    pub node: Tree<T>,
}

/// Description of a tree node used in structure errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Branch { arity: usize },
    Field(Option<Cow<'static, str>>),
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf => write!(f, "leaf"),
            Self::Branch { arity } => write!(f, "branch of arity {}", arity),
            Self::Field(Some(name)) => write!(f, "field `{}`", name),
            Self::Field(None) => write!(f, "unnamed field"),
        }
    }
}

/// One step along a [`TreePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElem {
    Name(Cow<'static, str>),
    Position(usize),
}

impl PathElem {
    fn of(position: usize, name: &Option<Cow<'static, str>>) -> Self {
        match name {
            Some(name) => Self::Name(name.clone()),
            None => Self::Position(position),
        }
    }
}

/// Location of a node within a tree, e.g. `o2.desired_goal.block`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreePath(Vec<PathElem>);

impl TreePath {
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, elem: PathElem) {
        self.0.push(elem);
    }

    pub fn pop(&mut self) -> Option<PathElem> {
        self.0.pop()
    }

    /// This path followed by `other`.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        Self(self.0.iter().chain(&other.0).cloned().collect())
    }

    #[must_use]
    pub fn elems(&self) -> &[PathElem] {
        &self.0
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, elem) in self.0.iter().enumerate() {
            match elem {
                PathElem::Name(name) if i == 0 => write!(f, "{}", name)?,
                PathElem::Name(name) => write!(f, ".{}", name)?,
                PathElem::Position(pos) => write!(f, "[{}]", pos)?,
            }
        }
        Ok(())
    }
}

/// Error from a structural tree operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("structure mismatch at {path}: expected {expected}, found {found}")]
    StructureMismatch {
        path: TreePath,
        expected: NodeKind,
        found: NodeKind,
    },
    #[error("index {index} out of bounds for axis of length {len} at {path}")]
    IndexOutOfBounds {
        path: TreePath,
        index: isize,
        len: usize,
    },
    #[error("cannot index the 0-dimensional leaf at {path}")]
    IndexOnScalar { path: TreePath },
    #[error("shape error at {path}: {reason}")]
    Shape { path: TreePath, reason: String },
    #[error("no field named `{name}` at {path}")]
    MissingField { path: TreePath, name: String },
}

impl TreeError {
    pub(crate) fn shape<S: Into<String>>(path: &TreePath, reason: S) -> Self {
        Self::Shape {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// Location of the violation.
    pub const fn path(&self) -> &TreePath {
        match self {
            Self::StructureMismatch { path, .. }
            | Self::IndexOutOfBounds { path, .. }
            | Self::IndexOnScalar { path }
            | Self::Shape { path, .. }
            | Self::MissingField { path, .. } => path,
        }
    }
}

impl<T> Tree<T> {
    #[inline]
    pub const fn leaf(value: T) -> Self {
        Self::Leaf(value)
    }

    /// Branch with positional (unnamed) children.
    pub fn tuple<I: IntoIterator<Item = Self>>(nodes: I) -> Self {
        Self::Branch(
            nodes
                .into_iter()
                .map(|node| Child { name: None, node })
                .collect(),
        )
    }

    /// Branch with named children, in the given order.
    pub fn record<I, N>(fields: I) -> Self
    where
        I: IntoIterator<Item = (N, Self)>,
        N: Into<Cow<'static, str>>,
    {
        Self::Branch(
            fields
                .into_iter()
                .map(|(name, node)| Child {
                    name: Some(name.into()),
                    node,
                })
                .collect(),
        )
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Leaf(_) => NodeKind::Leaf,
            Self::Branch(children) => NodeKind::Branch {
                arity: children.len(),
            },
        }
    }

    #[inline]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    #[inline]
    pub const fn as_leaf(&self) -> Option<&T> {
        match self {
            Self::Leaf(value) => Some(value),
            Self::Branch(_) => None,
        }
    }

    #[allow(clippy::missing_const_for_fn)] // destructors cannot be evaluated at compile-time
    pub fn into_leaf(self) -> Option<T> {
        match self {
            Self::Leaf(value) => Some(value),
            Self::Branch(_) => None,
        }
    }

    /// The `i`-th child of a branch.
    pub fn child(&self, i: usize) -> Option<&Self> {
        match self {
            Self::Leaf(_) => None,
            Self::Branch(children) => children.get(i).map(|c| &c.node),
        }
    }

    /// The child of a branch with the given name.
    pub fn field(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Leaf(_) => None,
            Self::Branch(children) => children
                .iter()
                .find(|c| c.name.as_deref() == Some(name))
                .map(|c| &c.node),
        }
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Self> {
        match self {
            Self::Leaf(_) => None,
            Self::Branch(children) => children
                .iter_mut()
                .find(|c| c.name.as_deref() == Some(name))
                .map(|c| &mut c.node),
        }
    }

    /// Like [`Tree::field`] but reports a missing field as an error.
    pub fn try_field(&self, name: &str) -> Result<&Self, TreeError> {
        self.field(name).ok_or_else(|| TreeError::MissingField {
            path: TreePath::root(),
            name: name.into(),
        })
    }

    /// Destructure a branch with exactly the named fields `names`, in order.
    pub fn into_record<const N: usize>(
        self,
        names: [&'static str; N],
    ) -> Result<[Self; N], TreeError> {
        self.check_record(&names)?;
        match self {
            Self::Branch(children) => children
                .into_iter()
                .map(|c| c.node)
                .collect::<Vec<_>>()
                .try_into()
                .map_err(|nodes: Vec<Self>| TreeError::StructureMismatch {
                    path: TreePath::root(),
                    expected: NodeKind::Branch { arity: N },
                    found: NodeKind::Branch { arity: nodes.len() },
                }),
            Self::Leaf(_) => Err(TreeError::StructureMismatch {
                path: TreePath::root(),
                expected: NodeKind::Branch { arity: N },
                found: NodeKind::Leaf,
            }),
        }
    }

    /// Check that this is a branch with exactly the named fields `names`, in order.
    pub fn check_record(&self, names: &[&'static str]) -> Result<(), TreeError> {
        let children = match self {
            Self::Branch(children) if children.len() == names.len() => children,
            node => {
                return Err(TreeError::StructureMismatch {
                    path: TreePath::root(),
                    expected: NodeKind::Branch { arity: names.len() },
                    found: node.kind(),
                })
            }
        };
        for (i, (child, &name)) in children.iter().zip(names).enumerate() {
            if child.name.as_deref() != Some(name) {
                return Err(TreeError::StructureMismatch {
                    path: TreePath(vec![PathElem::Position(i)]),
                    expected: NodeKind::Field(Some(name.into())),
                    found: NodeKind::Field(child.name.clone()),
                });
            }
        }
        Ok(())
    }

    /// Leaves in depth-first child order.
    pub fn leaves(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.visit(&mut |leaf| out.push(leaf));
        out
    }

    fn visit<'a, F: FnMut(&'a T)>(&'a self, f: &mut F) {
        match self {
            Self::Leaf(value) => f(value),
            Self::Branch(children) => {
                for child in children {
                    child.node.visit(f);
                }
            }
        }
    }

    /// Leaves in depth-first child order together with their paths.
    pub fn leaves_with_paths(&self) -> Vec<(TreePath, &T)> {
        let mut out = Vec::new();
        self.visit_paths(&mut TreePath::root(), &mut out);
        out
    }

    fn visit_paths<'a>(&'a self, path: &mut TreePath, out: &mut Vec<(TreePath, &'a T)>) {
        match self {
            Self::Leaf(value) => out.push((path.clone(), value)),
            Self::Branch(children) => {
                for (i, child) in children.iter().enumerate() {
                    path.push(PathElem::of(i, &child.name));
                    child.node.visit_paths(path, out);
                    path.pop();
                }
            }
        }
    }

    pub fn num_leaves(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Branch(children) => children.iter().map(|c| c.node.num_leaves()).sum(),
        }
    }

    /// Whether `self` and `other` have identical structure.
    pub fn same_structure<U>(&self, other: &Tree<U>) -> bool {
        self.ensure_same_structure(other).is_ok()
    }

    /// Check that `self` and `other` have identical structure.
    pub fn ensure_same_structure<U>(&self, other: &Tree<U>) -> Result<(), TreeError> {
        self.check_structure(other, &mut TreePath::root())
    }

    fn check_structure<U>(&self, other: &Tree<U>, path: &mut TreePath) -> Result<(), TreeError> {
        match (self, other) {
            (Self::Leaf(_), Tree::Leaf(_)) => Ok(()),
            (Self::Branch(a), Tree::Branch(b)) if a.len() == b.len() => {
                for (i, (ca, cb)) in a.iter().zip(b).enumerate() {
                    path.push(PathElem::of(i, &ca.name));
                    if ca.name != cb.name {
                        return Err(TreeError::StructureMismatch {
                            path: path.clone(),
                            expected: NodeKind::Field(ca.name.clone()),
                            found: NodeKind::Field(cb.name.clone()),
                        });
                    }
                    ca.node.check_structure(&cb.node, path)?;
                    path.pop();
                }
                Ok(())
            }
            (a, b) => Err(TreeError::StructureMismatch {
                path: path.clone(),
                expected: a.kind(),
                found: b.kind(),
            }),
        }
    }

    /// Map each leaf to a new value, preserving structure.
    pub fn map<U, F: FnMut(&T) -> U>(&self, mut f: F) -> Tree<U> {
        self.map_inner(&mut f)
    }

    fn map_inner<U, F: FnMut(&T) -> U>(&self, f: &mut F) -> Tree<U> {
        match self {
            Self::Leaf(value) => Tree::Leaf(f(value)),
            Self::Branch(children) => Tree::Branch(
                children
                    .iter()
                    .map(|c| Child {
                        name: c.name.clone(),
                        node: c.node.map_inner(f),
                    })
                    .collect(),
            ),
        }
    }

    /// Fallible [`Tree::map`]; the closure also receives the path to the leaf.
    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<Tree<U>, E>
    where
        F: FnMut(&TreePath, &T) -> Result<U, E>,
    {
        self.try_map_inner(&mut TreePath::root(), &mut f)
    }

    fn try_map_inner<U, E, F>(&self, path: &mut TreePath, f: &mut F) -> Result<Tree<U>, E>
    where
        F: FnMut(&TreePath, &T) -> Result<U, E>,
    {
        match self {
            Self::Leaf(value) => Ok(Tree::Leaf(f(path, value)?)),
            Self::Branch(children) => {
                let mut out = Vec::with_capacity(children.len());
                for (i, child) in children.iter().enumerate() {
                    path.push(PathElem::of(i, &child.name));
                    let node = child.node.try_map_inner(path, f)?;
                    path.pop();
                    out.push(Child {
                        name: child.name.clone(),
                        node,
                    });
                }
                Ok(Tree::Branch(out))
            }
        }
    }

    /// Combine the paired leaves of two same-structure trees into a new tree.
    ///
    /// Fails with [`TreeError::StructureMismatch`] before calling `f` if the structures differ.
    pub fn try_zip_with<U, V, E, F>(&self, other: &Tree<U>, mut f: F) -> Result<Tree<V>, E>
    where
        F: FnMut(&TreePath, &T, &U) -> Result<V, E>,
        E: From<TreeError>,
    {
        self.ensure_same_structure(other)?;
        self.zip_inner(other, &mut TreePath::root(), &mut f)
    }

    fn zip_inner<U, V, E, F>(
        &self,
        other: &Tree<U>,
        path: &mut TreePath,
        f: &mut F,
    ) -> Result<Tree<V>, E>
    where
        F: FnMut(&TreePath, &T, &U) -> Result<V, E>,
        E: From<TreeError>,
    {
        match (self, other) {
            (Self::Leaf(a), Tree::Leaf(b)) => Ok(Tree::Leaf(f(path, a, b)?)),
            (Self::Branch(a), Tree::Branch(b)) => {
                let mut out = Vec::with_capacity(a.len());
                for (i, (ca, cb)) in a.iter().zip(b).enumerate() {
                    path.push(PathElem::of(i, &ca.name));
                    let node = ca.node.zip_inner(&cb.node, path, f)?;
                    path.pop();
                    out.push(Child {
                        name: ca.name.clone(),
                        node,
                    });
                }
                Ok(Tree::Branch(out))
            }
            (a, b) => Err(TreeError::StructureMismatch {
                path: path.clone(),
                expected: a.kind(),
                found: b.kind(),
            }
            .into()),
        }
    }

    /// Visit the paired leaves of two same-structure trees.
    pub fn try_for_each_pair<U, E, F>(&self, other: &Tree<U>, mut f: F) -> Result<(), E>
    where
        F: FnMut(&TreePath, &T, &U) -> Result<(), E>,
        E: From<TreeError>,
    {
        self.try_zip_with(other, |path, a, b| f(path, a, b))
            .map(|_: Tree<()>| ())
    }

    /// Walk two same-structure trees together, mutating the leaves of `self`.
    ///
    /// Fails with [`TreeError::StructureMismatch`] before any leaf is visited
    /// if the structures differ.
    pub fn try_zip_mut<U, E, F>(&mut self, other: &Tree<U>, mut f: F) -> Result<(), E>
    where
        F: FnMut(&TreePath, &mut T, &U) -> Result<(), E>,
        E: From<TreeError>,
    {
        self.ensure_same_structure(other)?;
        self.zip_mut_inner(other, &mut TreePath::root(), &mut f)
    }

    fn zip_mut_inner<U, E, F>(
        &mut self,
        other: &Tree<U>,
        path: &mut TreePath,
        f: &mut F,
    ) -> Result<(), E>
    where
        F: FnMut(&TreePath, &mut T, &U) -> Result<(), E>,
        E: From<TreeError>,
    {
        match (self, other) {
            (Self::Leaf(a), Tree::Leaf(b)) => f(path, a, b),
            (Self::Branch(a), Tree::Branch(b)) => {
                for (i, (ca, cb)) in a.iter_mut().zip(b).enumerate() {
                    path.push(PathElem::of(i, &ca.name));
                    ca.node.zip_mut_inner(&cb.node, path, f)?;
                    path.pop();
                }
                Ok(())
            }
            (a, b) => Err(TreeError::StructureMismatch {
                path: path.clone(),
                expected: a.kind(),
                found: b.kind(),
            }
            .into()),
        }
    }

    /// Apply `f` to every leaf in place.
    pub fn for_each_mut<F: FnMut(&mut T)>(&mut self, mut f: F) {
        self.for_each_mut_inner(&mut f);
    }

    fn for_each_mut_inner<F: FnMut(&mut T)>(&mut self, f: &mut F) {
        match self {
            Self::Leaf(value) => f(value),
            Self::Branch(children) => {
                for child in children {
                    child.node.for_each_mut_inner(f);
                }
            }
        }
    }
}

impl ArrayTree {
    /// A 0-dimensional leaf.
    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self::Leaf(arr0(value).into_dyn())
    }

    /// A 1-dimensional leaf.
    #[must_use]
    pub fn from_vec(values: Vec<f64>) -> Self {
        Self::Leaf(Array1::from(values).into_dyn())
    }

    /// Length of the leading axis shared by every leaf.
    ///
    /// Fails if any leaf is 0-dimensional or the leaves disagree.
    pub fn batch_len(&self) -> Result<usize, TreeError> {
        let mut len = None;
        for (path, leaf) in self.leaves_with_paths() {
            let leaf_len = *leaf
                .shape()
                .first()
                .ok_or(TreeError::IndexOnScalar { path: path.clone() })?;
            match len {
                None => len = Some(leaf_len),
                Some(n) if n != leaf_len => {
                    return Err(TreeError::shape(
                        &path,
                        format!("leading axis of length {} but expected {}", leaf_len, n),
                    ))
                }
                Some(_) => {}
            }
        }
        len.ok_or_else(|| TreeError::shape(&TreePath::root(), "tree has no leaves"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn goal(gripper: [f64; 2], block: [f64; 2]) -> ArrayTree {
        Tree::record([
            ("gripper", ArrayTree::from_vec(gripper.to_vec())),
            ("block", ArrayTree::from_vec(block.to_vec())),
        ])
    }

    #[test]
    fn record_field_lookup() {
        let g = goal([1.0, 2.0], [3.0, 4.0]);
        assert_eq!(
            g.field("block").and_then(Tree::as_leaf),
            Some(&array![3.0, 4.0].into_dyn())
        );
        assert!(g.field("missing").is_none());
        assert!(matches!(
            g.try_field("missing"),
            Err(TreeError::MissingField { .. })
        ));
    }

    #[test]
    fn structure_ignores_leaf_widths() {
        let a = goal([1.0, 2.0], [3.0, 4.0]);
        let b = Tree::record([
            ("gripper", ArrayTree::scalar(0.0)),
            ("block", ArrayTree::from_vec(vec![0.0; 5])),
        ]);
        assert!(a.same_structure(&b));
    }

    #[test]
    fn structure_mismatch_arity() {
        let a = goal([1.0, 2.0], [3.0, 4.0]);
        let b = Tree::record([("gripper", ArrayTree::scalar(0.0))]);
        assert_eq!(
            a.ensure_same_structure(&b),
            Err(TreeError::StructureMismatch {
                path: TreePath::root(),
                expected: NodeKind::Branch { arity: 2 },
                found: NodeKind::Branch { arity: 1 },
            })
        );
    }

    #[test]
    fn structure_mismatch_leaf_vs_branch_reports_path() {
        let a = Tree::record([("x", goal([0.0; 2], [0.0; 2]))]);
        let b = Tree::record([("x", ArrayTree::scalar(0.0))]);
        let err = a.ensure_same_structure(&b).unwrap_err();
        assert_eq!(
            err,
            TreeError::StructureMismatch {
                path: TreePath(vec![PathElem::Name("x".into())]),
                expected: NodeKind::Branch { arity: 2 },
                found: NodeKind::Leaf,
            }
        );
        assert_eq!(
            err.to_string(),
            "structure mismatch at x: expected branch of arity 2, found leaf"
        );
    }

    #[test]
    fn structure_mismatch_names() {
        let a = Tree::record([("x", ArrayTree::scalar(0.0))]);
        let b = Tree::record([("y", ArrayTree::scalar(0.0))]);
        assert!(!a.same_structure(&b));
        assert!(!a.same_structure(&Tree::tuple([ArrayTree::scalar(0.0)])));
    }

    #[test]
    fn leaves_depth_first() {
        let t = Tree::tuple([
            Tree::leaf(1),
            Tree::record([("a", Tree::leaf(2)), ("b", Tree::tuple([Tree::leaf(3)]))]),
            Tree::leaf(4),
        ]);
        assert_eq!(t.leaves(), vec![&1, &2, &3, &4]);
        assert_eq!(t.num_leaves(), 4);
        let paths: Vec<_> = t
            .leaves_with_paths()
            .into_iter()
            .map(|(p, _)| p.to_string())
            .collect();
        assert_eq!(paths, vec!["[0]", "[1].a", "[1].b[0]", "[2]"]);
    }

    #[test]
    fn map_preserves_structure() {
        let t = Tree::record([("a", Tree::leaf(1)), ("b", Tree::tuple([Tree::leaf(2)]))]);
        let mapped = t.map(|x| x * 10);
        assert!(t.same_structure(&mapped));
        assert_eq!(mapped.leaves(), vec![&10, &20]);
    }

    #[test]
    fn try_zip_mut_writes_nothing_on_mismatch() {
        let mut a = Tree::tuple([Tree::leaf(1), Tree::leaf(2)]);
        let b = Tree::tuple([Tree::leaf(1)]);
        let result: Result<(), TreeError> = a.try_zip_mut(&b, |_, x, y| {
            *x += y;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(a.leaves(), vec![&1, &2]);
    }

    #[test]
    fn into_record_destructures() {
        let [gripper, block] = goal([1.0, 2.0], [3.0, 4.0])
            .into_record(["gripper", "block"])
            .unwrap();
        assert_eq!(gripper, ArrayTree::from_vec(vec![1.0, 2.0]));
        assert_eq!(block, ArrayTree::from_vec(vec![3.0, 4.0]));
    }

    #[test]
    fn into_record_wrong_name() {
        let result = goal([1.0, 2.0], [3.0, 4.0]).into_record(["gripper", "object"]);
        assert!(matches!(
            result,
            Err(TreeError::StructureMismatch { .. })
        ));
    }

    #[test]
    fn batch_len_consistent() {
        let t = Tree::tuple([
            Tree::leaf(ArrayD::zeros(vec![3, 2])),
            Tree::leaf(ArrayD::zeros(vec![3])),
        ]);
        assert_eq!(t.batch_len(), Ok(3));
    }

    #[test]
    fn batch_len_inconsistent() {
        let t = Tree::tuple([
            Tree::leaf(ArrayD::zeros(vec![3, 2])),
            Tree::leaf(ArrayD::zeros(vec![4])),
        ]);
        assert!(matches!(t.batch_len(), Err(TreeError::Shape { .. })));
    }

    #[test]
    fn error_path() {
        let path = TreePath(vec![PathElem::Name("o1".into()), PathElem::Position(1)]);
        let err = TreeError::shape(&path, "bad");
        assert_eq!(err.path().to_string(), "o1[1]");
    }

    #[test]
    fn path_display() {
        let mut path = TreePath::root();
        assert_eq!(path.to_string(), "<root>");
        path.push(PathElem::Name("o2".into()));
        path.push(PathElem::Name("desired_goal".into()));
        path.push(PathElem::Position(1));
        assert_eq!(path.to_string(), "o2.desired_goal[1]");
    }
}
