//! Tests for the selection utilities.

use rand::prelude::*;
use simple_cluster::utils::{median, quick_select_k};
use test_case::test_case;

#[test_case(&[1, 3, 5, 7, 9], 0, 1 ; "smallest")]
#[test_case(&[1, 3, 5, 7, 9], 3, 7 ; "fourth smallest")]
#[test_case(&[1, 3, 5, 7, 9], 4, 9 ; "largest")]
#[test_case(&[9, 7, 5, 3, 1], 3, 7 ; "reverse sorted")]
#[test_case(&[5, 1, 9, 3, 7], 2, 5 ; "shuffled")]
fn select(data: &[i32], k: usize, expected: i32) {
    assert_eq!(quick_select_k(data, k), Some(expected));
}

#[test]
fn select_out_of_bounds() {
    assert_eq!(quick_select_k(&[1, 2, 3], 3), None);
    assert_eq!(quick_select_k::<i32>(&[], 0), None);
}

#[test]
fn select_with_duplicates() {
    let data = vec![4, 4, 4, 4, 4, 4, 4, 4];
    for k in 0..data.len() {
        assert_eq!(quick_select_k(&data, k), Some(4));
    }

    let data = vec![2, 1, 2, 1, 2, 1];
    assert_eq!(quick_select_k(&data, 0), Some(1));
    assert_eq!(quick_select_k(&data, 2), Some(1));
    assert_eq!(quick_select_k(&data, 3), Some(2));
    assert_eq!(quick_select_k(&data, 5), Some(2));
}

#[test]
fn select_matches_sorting() {
    let mut rng = StdRng::seed_from_u64(42);
    let data = (0..257).map(|_| rng.gen_range(-1000..=1000)).collect::<Vec<i32>>();

    let mut sorted = data.clone();
    sorted.sort_unstable();

    for k in (0..data.len()).step_by(17) {
        assert_eq!(quick_select_k(&data, k), Some(sorted[k]), "rank {k} mismatch");
    }
}

#[test]
fn median_conventions() {
    // Odd length: the middle element.
    assert_eq!(median(&[5, 1, 3]), Some(3));
    // Even length: the lower of the two middle elements.
    assert_eq!(median(&[4, 1, 3, 2]), Some(2));
    assert_eq!(median::<i32>(&[]), None);
    assert_eq!(median(&[7]), Some(7));
}
