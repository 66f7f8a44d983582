//! The k-means clustering engine.
//!
//! The engine partitions `N` points in `d` dimensions into `k` clusters by
//! iteratively minimizing the sum of squared distances between points and
//! their assigned centers. The default assignment path is an accelerated
//! Lloyd iteration that maintains per-point distance bounds to skip most
//! point-center distance computations once the clustering starts to converge;
//! the alternative paths assign through a kd-tree over the centers.

use distances::Number;
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;

use crate::{
    seeding::{kmeans_pp_seeds, random_seeds, Seeding},
    vectors::DistanceKind,
};

mod session;

pub use session::Session;

/// The assignment strategies understood by the clustering engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Assignment {
    /// Exhaustive center scans, pruned with per-point upper and lower
    /// distance bounds.
    LinearBound,
    /// Exact nearest-center lookup through a kd-tree rebuilt each iteration.
    KdNn,
    /// Approximate kd-tree lookup with pruning slack `alpha`.
    KdAnn,
}

/// The stopping criteria for the iteration.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct KmeansCriteria {
    /// The pruning slack for [`Assignment::KdAnn`]; must be at least 1, and 1
    /// recovers exact lookups.
    pub alpha: f32,
    /// The convergence threshold on the aggregate center shift.
    pub accuracy: f32,
    /// The maximum number of iterations.
    pub iterations: usize,
}

impl Default for KmeansCriteria {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            accuracy: 1e-4,
            iterations: 100,
        }
    }
}

/// The configuration of a clustering call.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct KmeansConfig {
    /// The distance kind.
    pub distance: DistanceKind,
    /// How the initial centers are chosen.
    pub seeding: Seeding,
    /// How points are assigned to centers.
    pub assignment: Assignment,
    /// The stopping criteria.
    pub criteria: KmeansCriteria,
    /// The number of worker threads; results are bit-reproducible for a fixed
    /// thread count and RNG seed.
    pub n_threads: usize,
    /// An RNG seed override for tests; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Whether to log per-iteration progress.
    pub verbose: bool,
}

impl Default for KmeansConfig {
    fn default() -> Self {
        Self {
            distance: DistanceKind::L2,
            seeding: Seeding::PlusPlus,
            assignment: Assignment::LinearBound,
            criteria: KmeansCriteria::default(),
            n_threads: 1,
            seed: None,
            verbose: false,
        }
    }
}

/// The result of a clustering call.
pub struct Clustering {
    /// The final centers; the position in the order is the cluster id.
    centers: Vec<Vec<f32>>,
    /// The cluster id assigned to each point.
    labels: Vec<usize>,
    /// The seeds the iteration started from.
    seeds: Vec<Vec<f32>>,
}

impl Clustering {
    /// Returns the final centers; the position in the order is the cluster id.
    #[must_use]
    pub fn centers(&self) -> &[Vec<f32>] {
        &self.centers
    }

    /// Returns the cluster id assigned to each point.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Returns the seeds the iteration started from.
    #[must_use]
    pub fn seeds(&self) -> &[Vec<f32>] {
        &self.seeds
    }

    /// Consumes the result, returning the centers and the labels.
    #[must_use]
    pub fn into_centers_and_labels(self) -> (Vec<Vec<f32>>, Vec<usize>) {
        (self.centers, self.labels)
    }
}

/// Clusters `data` into `k` clusters.
///
/// Seeds are produced according to `config.seeding`; `seeds` is consulted only
/// for [`Seeding::User`]. The whole call runs inside a dedicated thread pool
/// of `config.n_threads` workers, and all parallel reductions merge their
/// partial results in a deterministic order, so a fixed seed and thread count
/// reproduce centers and labels bit-for-bit.
///
/// # Errors
///
/// * If the dataset is empty, ragged, or zero-dimensional.
/// * If `k` is zero or exceeds the number of points.
/// * If the criteria are degenerate (zero iterations, negative or non-finite
///   accuracy, or a non-finite or sub-1 `alpha` with [`Assignment::KdAnn`]).
/// * If `config.seeding` is [`Seeding::User`] and `seeds` is missing or has
///   the wrong shape.
/// * If the thread pool cannot be built.
pub fn simple_k_means<T: Number + Send + Sync>(
    data: &[Vec<T>],
    k: usize,
    seeds: Option<&[Vec<f32>]>,
    config: &KmeansConfig,
) -> Result<Clustering, String> {
    validate(data, k, seeds, config)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.n_threads)
        .build()
        .map_err(|e| format!("Could not build the thread pool: {e}"))?;

    pool.install(|| {
        let mut rng = config.seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let seeds = match config.seeding {
            Seeding::Random => random_seeds(data, k, &mut rng),
            Seeding::PlusPlus => kmeans_pp_seeds(data, k, config.distance, &mut rng),
            Seeding::User => seeds
                .unwrap_or_else(|| unreachable!("user seeds were validated above"))
                .to_vec(),
        };
        if config.verbose {
            ftlog::info!("finished seeding {k} clusters over {} points", data.len());
        }

        let mut session = Session::new(data, seeds.clone(), config.distance);
        match config.assignment {
            Assignment::LinearBound => session.run_bounded(&config.criteria, config.verbose),
            Assignment::KdNn => session.run_kd(&config.criteria, 1.0, config.verbose)?,
            Assignment::KdAnn => session.run_kd(&config.criteria, config.criteria.alpha, config.verbose)?,
        }

        let (centers, labels) = session.into_centers_and_labels();
        Ok(Clustering { centers, labels, seeds })
    })
}

/// Computes the distortion of a clustering: the square root of the summed
/// weighting kernel (squared Euclidean for L2, plain Manhattan for L1)
/// between each point and its assigned center.
pub fn distortion<T: Number + Send + Sync>(
    data: &[Vec<T>],
    centers: &[Vec<f32>],
    labels: &[usize],
    distance: DistanceKind,
) -> f32 {
    let chunk = chunk_len(data.len());
    data.par_chunks(chunk)
        .zip(labels.par_chunks(chunk))
        .map(|(points, labels)| {
            points
                .iter()
                .zip(labels.iter())
                .map(|(point, &l)| distance.between_sq(point, &centers[l]))
                .sum::<f32>()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .sum::<f32>()
        .sqrt()
}

/// The chunk length that partitions `n` items evenly over the current thread
/// pool. Chunk boundaries depend only on `n` and the pool size, so chunked
/// reductions are reproducible for a fixed thread count.
pub(crate) fn chunk_len(n: usize) -> usize {
    n.div_ceil(rayon::current_num_threads().max(1)).max(1)
}

/// Checks the preconditions of [`simple_k_means`].
fn validate<T: Number>(
    data: &[Vec<T>],
    k: usize,
    seeds: Option<&[Vec<f32>]>,
    config: &KmeansConfig,
) -> Result<(), String> {
    if data.is_empty() {
        return Err("The dataset is empty.".to_string());
    }
    let dimensionality = data[0].len();
    if dimensionality == 0 {
        return Err("The points have zero dimensionality.".to_string());
    }
    if data.iter().any(|p| p.len() != dimensionality) {
        return Err("The points have inconsistent dimensionality.".to_string());
    }
    if k == 0 {
        return Err("Cannot cluster into zero clusters.".to_string());
    }
    if data.len() < k {
        return Err(format!(
            "Cannot make {k} clusters from {} points; some would be empty.",
            data.len()
        ));
    }
    if config.n_threads == 0 {
        return Err("Need at least one worker thread.".to_string());
    }
    if config.criteria.iterations == 0 {
        return Err("Need at least one iteration.".to_string());
    }
    if config.criteria.accuracy < 0.0 || !config.criteria.accuracy.is_finite() {
        return Err("The accuracy must be non-negative and finite.".to_string());
    }
    if config.assignment == Assignment::KdAnn && (!config.criteria.alpha.is_finite() || config.criteria.alpha < 1.0) {
        return Err("The approximation slack alpha must be at least 1.".to_string());
    }
    if config.seeding == Seeding::User {
        let Some(seeds) = seeds else {
            return Err("User seeding requires seeds.".to_string());
        };
        if seeds.len() != k {
            return Err(format!("Expected {k} seeds but got {}.", seeds.len()));
        }
        if seeds.iter().any(|s| s.len() != dimensionality) {
            return Err("The seeds and the points have different dimensionality.".to_string());
        }
    }
    Ok(())
}
