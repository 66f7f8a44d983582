//! Data generation utilities for testing.

use rand::prelude::*;

/// `car` points of dimension `dim` with components uniform in `[min, max]`.
pub fn tabular(car: usize, dim: usize, min: f32, max: f32, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..car)
        .map(|_| (0..dim).map(|_| rng.gen_range(min..=max)).collect())
        .collect()
}

/// `count` points at the integer positions of the x axis.
pub fn line(count: usize) -> Vec<Vec<f32>> {
    (0..count).map(|i| vec![i as f32, 0.0]).collect()
}

/// Two tight square blobs of `car` points each, centered at `(0, 0)` and
/// `(offset, offset)`.
pub fn two_blobs(car: usize, offset: f32, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(2 * car);
    for center in [0.0, offset] {
        for _ in 0..car {
            data.push(vec![
                center + rng.gen_range(-1.0..=1.0),
                center + rng.gen_range(-1.0..=1.0),
            ]);
        }
    }
    data
}
