//! Session-local working state for the Lloyd iteration.
//!
//! All mutable clustering state lives in a [`Session`] owned by one
//! clustering call, so concurrent calls never share accumulators. The
//! iteration is a sequence of parallel-for regions separated by barriers:
//! within a region, per-point state is written in place and per-cluster
//! contributions are collected per chunk, then merged sequentially in chunk
//! order once the region ends.

use std::collections::HashMap;

use distances::Number;
use rayon::prelude::*;

use crate::{kd_tree::KdTree, utils::MaxItem, vectors::DistanceKind};

use super::{chunk_len, distortion, KmeansCriteria};

/// Number of consecutive stalled iterations after which the loop exits.
const MAX_STALLS: usize = 10;

/// The working state of one clustering call.
///
/// The caller owns the input data; the session exclusively owns everything
/// else and hands the centers and labels back when the iteration finishes.
///
/// The individual steps of the outer iteration are public so tests can drive
/// them directly and check the bound invariants between steps; they are meant
/// to be called in the order [`Session::greg_initialize`] once, then
/// [`Session::step`] until convergence.
pub struct Session<'a, T> {
    /// The input points (read-only).
    data: &'a [Vec<T>],
    /// The distance kind.
    distance: DistanceKind,
    /// The number of clusters.
    k: usize,
    /// The dimensionality of the points.
    dimensionality: usize,
    /// The current centers; the position in the order is the cluster id.
    centers: Vec<Vec<f32>>,
    /// Per cluster, the componentwise sum of its assigned points.
    sums: Vec<Vec<f32>>,
    /// Per cluster, the number of assigned points.
    sizes: Vec<usize>,
    /// Per point, the id of its assigned cluster.
    labels: Vec<usize>,
    /// Per point, an upper bound on the distance to its assigned center.
    upper: Vec<f32>,
    /// Per point, a lower bound on the distance to its second-nearest center.
    lower: Vec<f32>,
    /// Per cluster, the distance to the nearest other center.
    closest: Vec<f32>,
    /// Per cluster, the point farthest from its center, over all points.
    farthest: Vec<usize>,
    /// Per cluster, how far its center moved in the latest update.
    moved: Vec<f32>,
    /// Points whose sums/sizes accounting was moved by empty-cluster recovery
    /// while their label lagged behind, keyed by point index. An entry maps
    /// the point to the cluster currently holding its accounting and is
    /// consumed when a full scan corrects the label.
    adopted: HashMap<usize, usize>,
}

impl<'a, T: Number + Send + Sync> Session<'a, T> {
    /// Creates the working state for clustering `data` from the given seeds.
    ///
    /// # Panics
    ///
    /// If `data` or `seeds` is empty, if there are more seeds than points, or
    /// if the seeds and the points disagree on dimensionality.
    #[must_use]
    pub fn new(data: &'a [Vec<T>], seeds: Vec<Vec<f32>>, distance: DistanceKind) -> Self {
        assert!(!data.is_empty(), "Session::new called with no points");
        assert!(!seeds.is_empty(), "Session::new called with no seeds");
        assert!(seeds.len() <= data.len(), "Session::new called with more seeds than points");
        let dimensionality = data[0].len();
        assert!(
            seeds.iter().all(|s| s.len() == dimensionality),
            "Session::new called with seeds of the wrong dimensionality"
        );

        let n = data.len();
        let k = seeds.len();
        Self {
            data,
            distance,
            k,
            dimensionality,
            centers: seeds,
            sums: vec![vec![0.0; dimensionality]; k],
            sizes: vec![0; k],
            labels: vec![0; n],
            upper: vec![0.0; n],
            lower: vec![0.0; n],
            closest: vec![0.0; k],
            farthest: vec![0; k],
            moved: vec![0.0; k],
            adopted: HashMap::new(),
        }
    }

    /// Returns the current centers.
    #[must_use]
    pub fn centers(&self) -> &[Vec<f32>] {
        &self.centers
    }

    /// Returns the current per-point labels.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Returns the current per-cluster sizes.
    #[must_use]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Returns the current per-cluster sum vectors.
    #[must_use]
    pub fn sums(&self) -> &[Vec<f32>] {
        &self.sums
    }

    /// Returns the per-point upper bounds.
    #[must_use]
    pub fn upper(&self) -> &[f32] {
        &self.upper
    }

    /// Returns the per-point lower bounds.
    #[must_use]
    pub fn lower(&self) -> &[f32] {
        &self.lower
    }

    /// Returns how far each center moved in the latest update.
    #[must_use]
    pub fn moved(&self) -> &[f32] {
        &self.moved
    }

    /// Returns the distortion of the current assignment.
    #[must_use]
    pub fn distortion(&self) -> f32 {
        distortion(self.data, &self.centers, &self.labels, self.distance)
    }

    /// Consumes the session, returning the centers and the labels.
    #[must_use]
    pub fn into_centers_and_labels(self) -> (Vec<Vec<f32>>, Vec<usize>) {
        (self.centers, self.labels)
    }

    /// The initial exhaustive assignment.
    ///
    /// For each point, scans every center tracking the two smallest distances:
    /// the smallest becomes the point's label and upper bound, the second
    /// smallest its lower bound. The per-cluster sums and sizes are then
    /// rebuilt from the labels.
    pub fn greg_initialize(&mut self) {
        let chunk = chunk_len(self.data.len());
        {
            let Self {
                data,
                distance,
                ref centers,
                ref mut labels,
                ref mut upper,
                ref mut lower,
                ..
            } = *self;
            labels
                .par_chunks_mut(chunk)
                .zip(upper.par_chunks_mut(chunk))
                .zip(lower.par_chunks_mut(chunk))
                .enumerate()
                .for_each(|(c, ((labels, upper), lower))| {
                    let base = c * chunk;
                    for (offset, ((label, up), lo)) in
                        labels.iter_mut().zip(upper.iter_mut()).zip(lower.iter_mut()).enumerate()
                    {
                        let (t, min, min2) = nearest_two(centers, &data[base + offset], distance);
                        *label = t;
                        *up = min;
                        *lo = min2;
                    }
                });
        }
        self.accumulate();
    }

    /// Runs one full outer iteration and returns the aggregate center shift
    /// `e = sqrt(sum of moved)`.
    ///
    /// Must be preceded by [`Session::greg_initialize`].
    pub fn step(&mut self) -> f32 {
        self.refresh_closest();
        self.refresh_farthest();
        self.assign();
        self.update_center();
        self.update_bounds();
        self.moved.iter().sum::<f32>().sqrt()
    }

    /// Drives the bound-accelerated loop until a stopping criterion fires.
    pub(crate) fn run_bounded(&mut self, criteria: &KmeansCriteria, verbose: bool) {
        self.greg_initialize();

        let mut e = criteria.accuracy;
        let mut stalls = 0;
        let mut iteration = 0;
        loop {
            let e_prev = e;
            e = self.step();
            iteration += 1;
            if (e - e_prev).abs() < criteria.accuracy {
                stalls += 1;
            } else {
                stalls = 0;
            }
            if verbose {
                ftlog::info!(
                    "iteration {iteration}: center shift {e:.6}, distortion {:.6}",
                    self.distortion()
                );
            }
            if iteration >= criteria.iterations || e < criteria.accuracy || stalls >= MAX_STALLS {
                break;
            }
        }

        if verbose {
            ftlog::info!("finished clustering with center shift {e:.6} after {iteration} iterations");
        }
    }

    /// Drives the kd-tree assignment loop until a stopping criterion fires.
    ///
    /// This path rebuilds a kd-tree over the current centers each iteration
    /// and reassigns every point through it; it maintains no bounds and does
    /// not recover empty clusters.
    ///
    /// # Errors
    ///
    /// If the kd-tree cannot be built over the centers.
    pub(crate) fn run_kd(&mut self, criteria: &KmeansCriteria, alpha: f32, verbose: bool) -> Result<(), String> {
        let chunk = chunk_len(self.data.len());

        let mut e = criteria.accuracy;
        let mut stalls = 0;
        let mut iteration = 0;
        loop {
            let tree = KdTree::build(&self.centers, self.distance)?;
            {
                let Self { data, ref mut labels, .. } = *self;
                labels.par_chunks_mut(chunk).enumerate().for_each(|(c, labels)| {
                    let base = c * chunk;
                    for (offset, label) in labels.iter_mut().enumerate() {
                        *label = tree.ann_search(&data[base + offset], alpha).0;
                    }
                });
            }
            self.accumulate();
            self.update_center();

            let e_prev = e;
            e = self.moved.iter().sum::<f32>().sqrt();
            iteration += 1;
            if (e - e_prev).abs() < criteria.accuracy {
                stalls += 1;
            } else {
                stalls = 0;
            }
            if verbose {
                ftlog::info!(
                    "iteration {iteration}: center shift {e:.6}, distortion {:.6}",
                    self.distortion()
                );
            }
            if iteration >= criteria.iterations || e < criteria.accuracy || stalls >= MAX_STALLS {
                break;
            }
        }

        if verbose {
            ftlog::info!("finished clustering with center shift {e:.6} after {iteration} iterations");
        }
        Ok(())
    }

    /// Moves the centers of the non-empty clusters to the mean of their
    /// assigned points and records how far each center moved. Empty clusters
    /// are left unchanged with a movement of zero.
    #[expect(clippy::cast_precision_loss)]
    pub fn update_center(&mut self) {
        for c in 0..self.k {
            if self.sizes[c] == 0 {
                self.moved[c] = 0.0;
                continue;
            }
            let size = self.sizes[c] as f32;
            let center = self.sums[c].iter().map(|&s| s / size).collect::<Vec<_>>();
            self.moved[c] = self.distance.between(&self.centers[c], &center);
            self.centers[c] = center;
        }
    }

    /// Loosens the per-point bounds to account for the latest center
    /// movements.
    ///
    /// Each point's upper bound grows by how far its own center moved. Its
    /// lower bound shrinks by the largest movement among the *other* centers,
    /// which is the largest movement overall unless the point is assigned to
    /// the center that moved the most.
    pub fn update_bounds(&mut self) {
        let r = self
            .moved
            .iter()
            .enumerate()
            .max_by_key(|&(c, &m)| MaxItem(c, m))
            .map_or(0, |(c, _)| c);
        // With a single cluster there is no "other" center; falling back to
        // `r` keeps the subtraction harmless since the lower bounds are
        // infinite.
        let r2 = self
            .moved
            .iter()
            .enumerate()
            .filter(|&(c, _)| c != r)
            .max_by_key(|&(c, &m)| MaxItem(c, m))
            .map_or(r, |(c, _)| c);

        let chunk = chunk_len(self.data.len());
        let Self {
            ref moved,
            ref labels,
            ref mut upper,
            ref mut lower,
            ..
        } = *self;
        upper
            .par_chunks_mut(chunk)
            .zip(lower.par_chunks_mut(chunk))
            .zip(labels.par_chunks(chunk))
            .for_each(|((upper, lower), labels)| {
                for ((up, lo), &l) in upper.iter_mut().zip(lower.iter_mut()).zip(labels.iter()) {
                    *up += moved[l];
                    *lo -= if l == r { moved[r2] } else { moved[r] };
                }
            });
    }

    /// Recomputes, for each cluster, the distance from its center to the
    /// nearest other center.
    fn refresh_closest(&mut self) {
        for i in 0..self.k {
            let mut min = f32::INFINITY;
            for j in 0..self.k {
                if j != i {
                    min = min.min(self.distance.between(&self.centers[i], &self.centers[j]));
                }
            }
            self.closest[i] = min;
        }
    }

    /// Recomputes, for each cluster, the point farthest from its center.
    ///
    /// The maximum runs over all points, not just the assigned ones, and is
    /// recomputed from scratch each iteration. Chunk partials are merged in
    /// chunk order with a strict comparison, so the earliest maximizing point
    /// wins deterministically.
    fn refresh_farthest(&mut self) {
        let chunk = chunk_len(self.data.len());
        let k = self.k;
        let data = self.data;
        let distance = self.distance;
        let centers = &self.centers;

        let partials = data
            .par_chunks(chunk)
            .enumerate()
            .map(|(c, points)| {
                let base = c * chunk;
                let mut dist = vec![f32::NEG_INFINITY; k];
                let mut index = vec![0; k];
                for (offset, point) in points.iter().enumerate() {
                    for (j, center) in centers.iter().enumerate() {
                        let d = distance.between(center, point);
                        if d > dist[j] {
                            dist[j] = d;
                            index[j] = base + offset;
                        }
                    }
                }
                (dist, index)
            })
            .collect::<Vec<_>>();

        let mut best = vec![f32::NEG_INFINITY; k];
        for (dist, index) in partials {
            for j in 0..k {
                if dist[j] > best[j] {
                    best[j] = dist[j];
                    self.farthest[j] = index[j];
                }
            }
        }
    }

    /// The per-point assignment pass with the two bound tests.
    ///
    /// Let `l` be a point's label and `m = max(closest[l] / 2, lower)`. If
    /// the upper bound is within `m`, no other center can be nearer and the
    /// point is skipped. Otherwise the upper bound is tightened to the true
    /// distance and re-tested; only if it still exceeds `m` does the full
    /// center scan run.
    ///
    /// Labels and bounds are written in place; cluster membership changes are
    /// collected per chunk and applied to the sums and sizes after the
    /// parallel region, in chunk order. Clusters emptied by those changes are
    /// recovered from their farthest observers, serially.
    ///
    /// Returns the number of points that changed cluster.
    pub fn assign(&mut self) -> usize {
        let chunk = chunk_len(self.data.len());
        let moves = {
            let Self {
                data,
                distance,
                ref centers,
                ref closest,
                ref mut labels,
                ref mut upper,
                ref mut lower,
                ..
            } = *self;
            labels
                .par_chunks_mut(chunk)
                .zip(upper.par_chunks_mut(chunk))
                .zip(lower.par_chunks_mut(chunk))
                .enumerate()
                .map(|(c, ((labels, upper), lower))| {
                    let base = c * chunk;
                    let mut moves = Vec::new();
                    for (offset, ((label, up), lo)) in
                        labels.iter_mut().zip(upper.iter_mut()).zip(lower.iter_mut()).enumerate()
                    {
                        let point = &data[base + offset];
                        let l = *label;
                        let m = (closest[l] / 2.0).max(*lo);
                        // First bound test.
                        if *up <= m {
                            continue;
                        }
                        // Tighten the upper bound to the true distance.
                        *up = distance.between(&centers[l], point);
                        // Second bound test.
                        if *up <= m {
                            continue;
                        }
                        let (t, min, min2) = nearest_two(centers, point, distance);
                        *label = t;
                        *up = min;
                        *lo = min2;
                        if t != l {
                            moves.push((base + offset, l, t));
                        }
                    }
                    moves
                })
                .collect::<Vec<_>>()
        };
        let moves = moves.into_iter().flatten().collect::<Vec<_>>();

        let data = self.data;
        let mut drained = Vec::new();
        for &(i, from, to) in &moves {
            // A recovery may have moved this point's accounting already; the
            // transfer leaves from wherever the accounting actually is.
            let from = self.adopted.remove(&i).unwrap_or(from);
            if from == to {
                continue;
            }
            self.sizes[to] += 1;
            self.sizes[from] -= 1;
            for (s, v) in self.sums[to].iter_mut().zip(data[i].iter()) {
                *s += v.as_f32();
            }
            for (s, v) in self.sums[from].iter_mut().zip(data[i].iter()) {
                *s -= v.as_f32();
            }
            drained.push(from);
        }
        for from in drained {
            if self.sizes[from] == 0 {
                self.recover_empty(from);
            }
        }

        moves.len()
    }

    /// Reseeds an emptied cluster from its farthest observer.
    ///
    /// The observer is moved into the cluster in the sums and sizes only; its
    /// label stays with its current cluster and is corrected by a later full
    /// scan. The point is marked as adopted so that the correcting scan
    /// transfers its accounting from here rather than from its labeled
    /// cluster.
    fn recover_empty(&mut self, emptied: usize) {
        let observer = self.farthest[emptied];
        let donor = self.adopted.get(&observer).copied().unwrap_or(self.labels[observer]);
        ftlog::debug!("cluster {emptied} became empty; reseeding it from point {observer}");

        self.sizes[donor] -= 1;
        self.sizes[emptied] += 1;
        let point = &self.data[observer];
        for (s, v) in self.sums[emptied].iter_mut().zip(point.iter()) {
            *s += v.as_f32();
        }
        for (s, v) in self.sums[donor].iter_mut().zip(point.iter()) {
            *s -= v.as_f32();
        }
        self.adopted.insert(observer, emptied);
    }

    /// Rebuilds the per-cluster sums and sizes from the current labels.
    ///
    /// Each chunk of points accumulates into its own local buffers, which are
    /// merged in chunk order once the parallel region ends.
    fn accumulate(&mut self) {
        let chunk = chunk_len(self.data.len());
        let k = self.k;
        let dimensionality = self.dimensionality;
        let data = self.data;

        let partials = data
            .par_chunks(chunk)
            .zip(self.labels.par_chunks(chunk))
            .map(|(points, labels)| {
                let mut sums = vec![vec![0.0; dimensionality]; k];
                let mut sizes = vec![0_usize; k];
                for (point, &l) in points.iter().zip(labels.iter()) {
                    sizes[l] += 1;
                    for (s, v) in sums[l].iter_mut().zip(point.iter()) {
                        *s += v.as_f32();
                    }
                }
                (sums, sizes)
            })
            .collect::<Vec<_>>();

        self.adopted.clear();
        for sums in &mut self.sums {
            for s in sums.iter_mut() {
                *s = 0.0;
            }
        }
        for size in &mut self.sizes {
            *size = 0;
        }
        for (sums, sizes) in partials {
            for c in 0..k {
                self.sizes[c] += sizes[c];
                for (acc, s) in self.sums[c].iter_mut().zip(sums[c].iter()) {
                    *acc += s;
                }
            }
        }
    }
}

/// Scans every center for the two nearest to `point`.
///
/// Returns the index of the nearest center, the distance to it, and the
/// distance to the second-nearest center. Ties go to the later center, and
/// with a single center the second distance is infinite.
fn nearest_two<T: Number>(centers: &[Vec<f32>], point: &[T], distance: DistanceKind) -> (usize, f32, f32) {
    let mut min = f32::INFINITY;
    let mut min2 = f32::INFINITY;
    let mut nearest = 0;
    for (j, center) in centers.iter().enumerate() {
        let d = distance.between(center, point);
        if d <= min {
            min2 = min;
            min = d;
            nearest = j;
        } else if d < min2 {
            min2 = d;
        }
    }
    (nearest, min, min2)
}
