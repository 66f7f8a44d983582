//! Distance kernels over numeric vectors.
//!
//! Unlike the same-typed kernels in the [`distances`] crate, the kernels here
//! accept slices with *different* element types on the two sides. Components
//! are promoted to `f32` at the point of arithmetic, and sums are accumulated
//! in index order so that results are deterministic for identical inputs.

use distances::Number;

/// The distance kinds understood by the clustering engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DistanceKind {
    /// The Manhattan (L1) distance.
    L1,
    /// The Euclidean (L2) distance.
    L2,
}

impl DistanceKind {
    /// Computes the distance between `x` and `y` under this kind.
    pub fn between<T: Number, U: Number>(self, x: &[T], y: &[U]) -> f32 {
        match self {
            Self::L1 => manhattan(x, y),
            Self::L2 => euclidean(x, y),
        }
    }

    /// Computes the kernel used for D²-weighting and distortion sums.
    ///
    /// This is the squared Euclidean distance for `L2` and the plain Manhattan
    /// distance for `L1`, i.e. the summand before any final root is taken.
    pub fn between_sq<T: Number, U: Number>(self, x: &[T], y: &[U]) -> f32 {
        match self {
            Self::L1 => manhattan(x, y),
            Self::L2 => euclidean_sq(x, y),
        }
    }

    /// Returns the name of this distance kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::L1 => "manhattan",
            Self::L2 => "euclidean",
        }
    }
}

/// Euclidean distance between two vectors.
///
/// The square root of the sum of the squares of the componentwise differences,
/// with both sides promoted to `f32`.
///
/// # Examples
///
/// ```
/// let x: Vec<i32> = vec![1, 2, 3];
/// let y: Vec<f32> = vec![4.0, 5.0, 6.0];
///
/// let distance = simple_cluster::vectors::euclidean(&x, &y);
///
/// assert!((distance - 27.0_f32.sqrt()).abs() <= f32::EPSILON);
/// ```
pub fn euclidean<T: Number, U: Number>(x: &[T], y: &[U]) -> f32 {
    euclidean_sq(x, y).sqrt()
}

/// Squared Euclidean distance between two vectors.
///
/// The sum of the squares of the componentwise differences, with both sides
/// promoted to `f32`. No square root is taken.
pub fn euclidean_sq<T: Number, U: Number>(x: &[T], y: &[U]) -> f32 {
    x.iter()
        .zip(y.iter())
        .map(|(&a, &b)| a.as_f32() - b.as_f32())
        .map(|v| v * v)
        .sum()
}

/// Manhattan distance between two vectors.
///
/// The sum of the absolute componentwise differences, with both sides promoted
/// to `f32`.
pub fn manhattan<T: Number, U: Number>(x: &[T], y: &[U]) -> f32 {
    x.iter()
        .zip(y.iter())
        .map(|(&a, &b)| (a.as_f32() - b.as_f32()).abs())
        .sum()
}

/// Hamming distance between two vectors.
///
/// The number of components whose promoted values differ.
pub fn hamming<T: Number, U: Number>(x: &[T], y: &[U]) -> f32 {
    x.iter()
        .zip(y.iter())
        .fold(0.0, |count, (&a, &b)| {
            if (a.as_f32() - b.as_f32()).abs() > 0.0 {
                count + 1.0
            } else {
                count
            }
        })
}
