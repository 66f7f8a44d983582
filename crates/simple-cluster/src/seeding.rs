//! Seed selection for the clustering engine.
//!
//! Seeds are initial cluster centers, copied out of the dataset and promoted
//! to `f32`. Both seeders take the RNG by reference so tests can pass a seeded
//! [`rand::rngs::StdRng`]; the [`crate::kmeans::simple_k_means`] entry point
//! seeds from entropy unless given an override.

use distances::Number;
use rand::Rng;
use rayon::prelude::*;

use crate::vectors::DistanceKind;

/// The seeding modes understood by the clustering engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Seeding {
    /// Sample `k` distinct points uniformly at random.
    Random,
    /// D²-weighted sampling: each new seed is picked with probability
    /// proportional to its squared distance from the nearest existing seed.
    PlusPlus,
    /// Take the seeds from the caller.
    User,
}

/// Picks `k` distinct points uniformly at random as seeds.
///
/// This is reservoir sampling (Algorithm R), so every size-`k` subset of the
/// dataset is produced with equal probability. The seeds are returned in
/// reservoir order, not dataset order.
///
/// # Panics
///
/// If `k` is zero or exceeds the number of points.
pub fn random_seeds<T: Number, R: Rng>(data: &[Vec<T>], k: usize, rng: &mut R) -> Vec<Vec<f32>> {
    assert!(k >= 1, "Cannot select zero seeds.");
    assert!(k <= data.len(), "Cannot select more seeds than there are points.");

    let mut reservoir = (0..k).collect::<Vec<_>>();
    for i in k..data.len() {
        let j = rng.gen_range(0..=i);
        if j < k {
            reservoir[j] = i;
        }
    }

    reservoir.into_iter().map(|i| promote(&data[i])).collect()
}

/// Picks `k` seeds with D²-weighting.
///
/// The first seed is a uniformly random point. Each subsequent seed is drawn
/// with probability proportional to `D(i)`, the distance from point `i` to its
/// nearest existing seed under the weighting kernel of `distance` (squared
/// Euclidean for L2, plain Manhattan for L1):
///
/// 1. Form the cumulative sums `S(i)` of the `D(i)` in index order.
/// 2. Draw a uniform real `p` in `[0, S(N - 1)]`.
/// 3. The next seed is the point at the smallest `i` with `S(i) >= p`.
///
/// Duplicate seeds are possible when points coincide; the caller is expected
/// to tolerate empty clusters in that case.
///
/// # Panics
///
/// If `k` is zero or exceeds the number of points.
pub fn kmeans_pp_seeds<T: Number + Send + Sync, R: Rng>(
    data: &[Vec<T>],
    k: usize,
    distance: DistanceKind,
    rng: &mut R,
) -> Vec<Vec<f32>> {
    assert!(k >= 1, "Cannot select zero seeds.");
    assert!(k <= data.len(), "Cannot select more seeds than there are points.");

    let first = rng.gen_range(0..data.len());
    let mut seeds = Vec::with_capacity(k);
    seeds.push(promote(&data[first]));

    // D(i), maintained incrementally against the newest seed only.
    let mut weights = data
        .iter()
        .map(|point| distance.between_sq(point, &seeds[0]))
        .collect::<Vec<_>>();

    while seeds.len() < k {
        let mut total = 0.0;
        let prefix = weights
            .iter()
            .map(|&w| {
                total += w;
                total
            })
            .collect::<Vec<_>>();

        let pivot = rng.gen_range(0.0..=total);
        let next = prefix.partition_point(|&s| s < pivot).min(data.len() - 1);
        seeds.push(promote(&data[next]));

        if seeds.len() < k {
            let newest = seeds.last().unwrap_or_else(|| unreachable!("seeds is non-empty"));
            weights
                .par_iter_mut()
                .zip(data.par_iter())
                .for_each(|(w, point)| {
                    let d = distance.between_sq(point, newest);
                    if *w > d {
                        *w = d;
                    }
                });
        }
    }

    seeds
}

/// Copies a point, promoting its components to `f32`.
fn promote<T: Number>(point: &[T]) -> Vec<f32> {
    point.iter().map(|v| v.as_f32()).collect()
}
