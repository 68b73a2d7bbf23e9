//! Shape introspection and allocation of array trees.
use super::{ArrayTree, Child, Key, PathElem, Tree, TreeError, TreePath};
use ndarray::{ArrayD, IxDyn};
use smallvec::SmallVec;

/// Shape of a single leaf array.
pub type Shape = SmallVec<[usize; 4]>;

/// A tree of leaf shapes mirroring the structure of an [`ArrayTree`].
pub type ShapeTree = Tree<Shape>;

impl ArrayTree {
    /// The shape of every leaf, as a tree of the same structure.
    pub fn shape(&self) -> ShapeTree {
        self.map(|leaf| Shape::from_slice(leaf.shape()))
    }

    /// Feature shape of every leaf: the leaf shape without its leading axis.
    ///
    /// 0-dimensional leaves keep their (empty) shape.
    pub fn feature_shape(&self) -> ShapeTree {
        self.map(|leaf| Shape::from_slice(leaf.shape().get(1..).unwrap_or(&[])))
    }
}

/// Allocate a zero-filled tree with the structure of `template`.
///
/// Each leaf has shape `prefix` followed by the corresponding template shape.
pub fn allocate(template: &ShapeTree, prefix: &[usize]) -> Result<ArrayTree, TreeError> {
    allocate_inner(template, prefix, &mut TreePath::root())
}

fn allocate_inner(
    template: &ShapeTree,
    prefix: &[usize],
    path: &mut TreePath,
) -> Result<ArrayTree, TreeError> {
    match template {
        Tree::Leaf(feature_shape) => {
            let dims: Vec<usize> = prefix.iter().chain(feature_shape).copied().collect();
            let size = dims
                .iter()
                .try_fold(1_usize, |acc, &d| acc.checked_mul(d))
                .filter(|&size| isize::try_from(size).is_ok());
            if size.is_none() {
                return Err(TreeError::shape(
                    path,
                    format!("shape {:?} has too many elements to allocate", dims),
                ));
            }
            Ok(Tree::Leaf(ArrayD::zeros(IxDyn(&dims))))
        }
        Tree::Branch(children) if children.is_empty() => Err(TreeError::shape(
            path,
            "cannot allocate a branch with no children",
        )),
        Tree::Branch(children) => {
            let mut out = Vec::with_capacity(children.len());
            for (i, child) in children.iter().enumerate() {
                path.push(PathElem::of(i, &child.name));
                let node = allocate_inner(&child.node, prefix, path)?;
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

/// Allocate a zero-filled tree shaped like `prefix` batches of `sample`.
pub fn zeros_like(sample: &ArrayTree, prefix: &[usize]) -> Result<ArrayTree, TreeError> {
    allocate(&sample.shape(), prefix)
}

/// Stack same-structure, same-shape samples along a new leading axis.
pub fn stack(samples: &[ArrayTree]) -> Result<ArrayTree, TreeError> {
    let first = samples
        .first()
        .ok_or_else(|| TreeError::shape(&TreePath::root(), "cannot stack zero samples"))?;
    let template = first.shape();
    for sample in &samples[1..] {
        template.try_for_each_pair(sample, |path, expected, leaf| {
            if expected.as_slice() == leaf.shape() {
                Ok(())
            } else {
                Err(TreeError::shape(
                    path,
                    format!(
                        "sample leaf has shape {:?} but the first sample has {:?}",
                        leaf.shape(),
                        expected.as_slice()
                    ),
                ))
            }
        })?;
    }
    let mut out = allocate(&template, &[samples.len()])?;
    for (i, sample) in samples.iter().enumerate() {
        out.set(&Key::from(i), sample)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use smallvec::smallvec;

    fn sample(x: f64) -> ArrayTree {
        Tree::record([
            ("position", ArrayTree::scalar(x)),
            (
                "goal",
                Tree::tuple([
                    ArrayTree::from_vec(vec![x, x + 1.0]),
                    Tree::leaf(array![[x, 0.0, 0.0], [0.0, x, 0.0]].into_dyn()),
                ]),
            ),
        ])
    }

    #[test]
    fn shape_tree() {
        let shapes = sample(0.0).shape();
        let expected: Vec<Shape> = vec![smallvec![], smallvec![2], smallvec![2, 3]];
        assert_eq!(shapes.leaves(), expected.iter().collect::<Vec<_>>());
    }

    #[test]
    fn allocate_with_prefix() {
        let batch = allocate(&sample(1.0).shape(), &[5, 7]).unwrap();
        assert!(batch.same_structure(&sample(1.0)));
        let shapes: Vec<Vec<usize>> = batch.leaves().iter().map(|l| l.shape().to_vec()).collect();
        assert_eq!(shapes, vec![vec![5, 7], vec![5, 7, 2], vec![5, 7, 2, 3]]);
        assert!(batch.leaves().iter().all(|l| l.iter().all(|&x| x == 0.0)));
    }

    #[test]
    fn allocate_empty_branch_fails() {
        let template: ShapeTree = Tree::record([("empty", Tree::tuple([]))]);
        assert!(matches!(
            allocate(&template, &[3]),
            Err(TreeError::Shape { .. })
        ));
    }

    #[test]
    fn allocate_overflow_fails() {
        let template: ShapeTree = Tree::leaf(smallvec![usize::MAX, 2]);
        assert!(matches!(
            allocate(&template, &[1]),
            Err(TreeError::Shape { .. })
        ));
    }

    #[test]
    fn zeros_like_feature_shape() {
        let batch = zeros_like(&sample(0.0), &[4]).unwrap();
        assert_eq!(batch.feature_shape(), sample(0.0).shape());
    }

    #[test]
    fn stack_samples() {
        let stacked = stack(&[sample(1.0), sample(2.0), sample(3.0)]).unwrap();
        assert_eq!(stacked.batch_len(), Ok(3));
        assert_eq!(stacked.get(&Key::Index(1)).unwrap(), sample(2.0));
        assert_eq!(
            stacked.field("position").and_then(Tree::as_leaf),
            Some(&array![1.0, 2.0, 3.0].into_dyn())
        );
    }

    #[test]
    fn stack_empty_fails() {
        assert!(matches!(stack(&[]), Err(TreeError::Shape { .. })));
    }

    #[test]
    fn stack_mismatched_width_fails() {
        let odd = Tree::record([
            ("position", ArrayTree::scalar(0.0)),
            (
                "goal",
                Tree::tuple([
                    ArrayTree::from_vec(vec![0.0]),
                    Tree::leaf(ArrayD::zeros(vec![2, 3])),
                ]),
            ),
        ]);
        assert!(matches!(
            stack(&[sample(0.0), odd]),
            Err(TreeError::Shape { .. })
        ));
    }

    #[test]
    fn stack_mismatched_structure_fails() {
        let odd = Tree::record([("position", ArrayTree::scalar(0.0))]);
        assert!(matches!(
            stack(&[sample(0.0), odd]),
            Err(TreeError::StructureMismatch { .. })
        ));
    }
}
