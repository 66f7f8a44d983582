//! A kd-tree over cluster centers, for nearest-center assignment.
//!
//! The tree is rebuilt from the current centers whenever they move, so
//! construction favors simplicity: split on `depth % d`, root each subtree at
//! the median along that axis, and send ties to the right. Queries come in an
//! exact flavor and an α-approximate flavor that prunes more aggressively.

use distances::Number;

use crate::{utils, vectors::DistanceKind};

/// A node of a [`KdTree`].
struct KdNode {
    /// The center stored at this node.
    point: Vec<f32>,
    /// The index of that center among the build input, i.e. its cluster id.
    id: usize,
    /// The dimension this node splits on.
    split_dim: usize,
    /// The subtree of centers strictly less than `point` along `split_dim`.
    left: Option<Box<KdNode>>,
    /// The subtree of centers greater than or equal to `point` along
    /// `split_dim`; ties go right.
    right: Option<Box<KdNode>>,
}

/// A kd-tree over a non-empty set of centers.
///
/// A built tree always holds at least one center, so queries are total.
pub struct KdTree {
    /// The root node.
    root: KdNode,
    /// The dimensionality of the centers.
    dimensionality: usize,
    /// The distance kind used by queries.
    distance: DistanceKind,
}

impl KdTree {
    /// Builds a kd-tree over the given centers.
    ///
    /// The position of a center in `points` becomes its id in query results.
    ///
    /// # Errors
    ///
    /// * If `points` is empty.
    /// * If the centers have zero or inconsistent dimensionality.
    pub fn build(points: &[Vec<f32>], distance: DistanceKind) -> Result<Self, String> {
        if points.is_empty() {
            return Err("Cannot build a KdTree over zero centers.".to_string());
        }
        let dimensionality = points[0].len();
        if dimensionality == 0 {
            return Err("Cannot build a KdTree over zero-dimensional centers.".to_string());
        }
        if points.iter().any(|p| p.len() != dimensionality) {
            return Err("Cannot build a KdTree over centers of mixed dimensionality.".to_string());
        }

        let items = points.iter().map(Vec::as_slice).enumerate().collect::<Vec<_>>();
        let root = build_subtree(items, 0, dimensionality)
            .map(|node| *node)
            .unwrap_or_else(|| unreachable!("the build input is non-empty"));

        Ok(Self {
            root,
            dimensionality,
            distance,
        })
    }

    /// Returns the dimensionality of the centers in this tree.
    #[must_use]
    pub const fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    /// Returns the distance kind used by queries on this tree.
    #[must_use]
    pub const fn distance(&self) -> DistanceKind {
        self.distance
    }

    /// Finds the exact nearest center to `query`.
    ///
    /// Classical backtracking traversal: descend into the child on the query's
    /// side first, then visit the other child only when the distance to the
    /// splitting hyperplane is strictly less than the current best. For L2 the
    /// comparison runs in squared space and a single square root is taken at
    /// the end.
    ///
    /// Returns the nearest center's id and its distance from `query`.
    pub fn nn_search<T: Number>(&self, query: &[T]) -> (usize, f32) {
        self.search(query, 1.0)
    }

    /// Finds an approximate nearest center to `query`.
    ///
    /// Identical to [`Self::nn_search`], except that the hyperplane distance
    /// is scaled by `alpha` before the pruning comparison. Larger `alpha`
    /// prunes more branches at the cost of answer quality; `alpha = 1`
    /// recovers the exact search.
    pub fn ann_search<T: Number>(&self, query: &[T], alpha: f32) -> (usize, f32) {
        self.search(query, alpha)
    }

    /// The shared traversal behind [`Self::nn_search`] and [`Self::ann_search`].
    fn search<T: Number>(&self, query: &[T], alpha: f32) -> (usize, f32) {
        // The pruning scale lives in the same space as the running best:
        // squared for L2, plain for L1.
        let scale = match self.distance {
            DistanceKind::L1 => alpha,
            DistanceKind::L2 => alpha * alpha,
        };

        let mut best = (self.root.id, f32::INFINITY);
        descend(&self.root, query, self.distance, scale, &mut best);

        let (id, d) = best;
        match self.distance {
            DistanceKind::L1 => (id, d),
            DistanceKind::L2 => (id, d.sqrt()),
        }
    }
}

/// Recursively builds the subtree over `items`, splitting on `depth % dims`.
fn build_subtree(items: Vec<(usize, &[f32])>, depth: usize, dims: usize) -> Option<Box<KdNode>> {
    if items.is_empty() {
        return None;
    }

    let axis = depth % dims;
    let coords = items.iter().map(|&(_, p)| p[axis]).collect::<Vec<_>>();
    let median = utils::quick_select_k(&coords, (coords.len() - 1) / 2)
        .unwrap_or_else(|| unreachable!("the axis values are non-empty"));

    let mut lesser = Vec::new();
    let mut greater = Vec::new();
    let mut chosen = None;
    for (id, point) in items {
        if point[axis] < median {
            lesser.push((id, point));
        } else if chosen.is_none() && point[axis] <= median {
            chosen = Some((id, point));
        } else {
            greater.push((id, point));
        }
    }
    let (id, point) = chosen.unwrap_or_else(|| unreachable!("the median value occurs in the scanned axis"));

    Some(Box::new(KdNode {
        point: point.to_vec(),
        id,
        split_dim: axis,
        left: build_subtree(lesser, depth + 1, dims),
        right: build_subtree(greater, depth + 1, dims),
    }))
}

/// The traversal step shared by the exact and approximate queries.
///
/// `best` holds `(center id, distance)` in the comparison space of `distance`
/// (squared for L2, plain for L1), and `scale` is the pruning slack in that
/// same space.
fn descend<T: Number>(node: &KdNode, query: &[T], distance: DistanceKind, scale: f32, best: &mut (usize, f32)) {
    let d = distance.between_sq(&node.point, query);
    if d < best.1 {
        *best = (node.id, d);
    }

    let gap = query[node.split_dim].as_f32() - node.point[node.split_dim];
    let (near, far) = if gap < 0.0 {
        (&node.left, &node.right)
    } else {
        (&node.right, &node.left)
    };

    if let Some(child) = near {
        descend(child, query, distance, scale, best);
    }

    let plane = match distance {
        DistanceKind::L1 => gap.abs(),
        DistanceKind::L2 => gap * gap,
    };
    if plane * scale < best.1 {
        if let Some(child) = far {
            descend(child, query, distance, scale, best);
        }
    }
}
