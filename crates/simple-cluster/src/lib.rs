//! A k-means clustering engine for high-dimensional numeric data.
//!
//! The engine partitions `N` points of dimension `d` into `k` clusters under
//! the L1 or L2 distance. Points may have any numeric element type; all
//! center arithmetic runs in `f32`. The main loop is an accelerated Lloyd
//! iteration that caches, for every point, an upper bound on the distance to
//! its assigned center and a lower bound on the distance to its second-nearest
//! center, and uses the two to skip most point-center distance computations.
//! Assignment can instead go through a kd-tree over the centers, either
//! exactly or with a tunable approximation slack.
//!
//! The top-level entry point is [`simple_k_means`]. The pieces it is built
//! from are public as well: seed selection in [`seeding`], the kd-tree in
//! [`kd_tree`], the distance kernels in [`vectors`], and the per-iteration
//! steps of the bound-accelerated loop on [`kmeans::Session`].
//!
//! Work is shared across points with [`rayon`], and every parallel reduction
//! merges its partial results in a deterministic order: for a fixed RNG seed
//! and thread count, two runs produce bit-identical centers and labels.

pub mod kd_tree;
pub mod kmeans;
pub mod seeding;
pub mod utils;
pub mod vectors;

pub use kd_tree::KdTree;
pub use kmeans::{distortion, simple_k_means, Assignment, Clustering, KmeansConfig, KmeansCriteria, Session};
pub use seeding::{kmeans_pp_seeds, random_seeds, Seeding};
pub use vectors::DistanceKind;
