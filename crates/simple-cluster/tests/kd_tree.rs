//! Tests for the kd-tree over centers.

use float_cmp::approx_eq;
use simple_cluster::{utils::MinItem, vectors, DistanceKind, KdTree};
use test_case::test_case;

mod common;

/// Exhaustive nearest-center scan to compare queries against.
fn linear_nn(centers: &[Vec<f32>], query: &[f32], distance: DistanceKind) -> (usize, f32) {
    centers
        .iter()
        .enumerate()
        .map(|(i, c)| (i, distance.between(c, query)))
        .min_by_key(|&(i, d)| MinItem(i, d))
        .unwrap()
}

#[test]
fn three_centers() {
    let centers = vec![vec![0.0, 0.0], vec![5.0, 5.0], vec![0.0, 10.0]];
    let tree = KdTree::build(&centers, DistanceKind::L2).unwrap();

    let (id, d) = tree.nn_search(&[0.0_f32, 9.0]);
    assert_eq!(id, 2, "the nearest center to (0, 9) is (0, 10)");
    assert!(approx_eq!(f32, d, 1.0, ulps = 2));
    assert!(approx_eq!(f32, d * d, 1.0, ulps = 2));
}

#[test]
fn single_center() {
    let centers = vec![vec![1.0, 2.0, 3.0]];
    let tree = KdTree::build(&centers, DistanceKind::L2).unwrap();

    let (id, d) = tree.nn_search(&[1.0_f32, 2.0, 7.0]);
    assert_eq!(id, 0);
    assert!(approx_eq!(f32, d, 4.0, ulps = 2));
}

#[test]
fn build_rejects_bad_input() {
    assert!(KdTree::build(&[], DistanceKind::L2).is_err());
    assert!(KdTree::build(&[vec![]], DistanceKind::L2).is_err());
    assert!(KdTree::build(&[vec![1.0, 2.0], vec![1.0]], DistanceKind::L2).is_err());
}

#[test]
fn queries_accept_any_element_type() {
    let centers = vec![vec![0.0, 0.0], vec![10.0, 10.0]];
    let tree = KdTree::build(&centers, DistanceKind::L2).unwrap();

    let (id, _) = tree.nn_search(&[9_i32, 8]);
    assert_eq!(id, 1);
}

#[test_case(DistanceKind::L2 ; "euclidean")]
#[test_case(DistanceKind::L1 ; "manhattan")]
fn agrees_with_linear_scan(distance: DistanceKind) {
    let centers = common::data_gen::tabular(20, 4, -10.0, 10.0, 7);
    let queries = common::data_gen::tabular(100, 4, -12.0, 12.0, 8);
    let tree = KdTree::build(&centers, distance).unwrap();

    for query in &queries {
        let (id, d) = tree.nn_search(query);
        let (want_id, want_d) = linear_nn(&centers, query, distance);
        assert_eq!(id, want_id, "query {query:?}");
        assert!(approx_eq!(f32, d, want_d, epsilon = 1e-5), "query {query:?}");
    }
}

#[test]
fn ann_with_unit_alpha_is_exact() {
    let centers = common::data_gen::tabular(32, 3, -5.0, 5.0, 11);
    let queries = common::data_gen::tabular(200, 3, -6.0, 6.0, 12);
    let tree = KdTree::build(&centers, DistanceKind::L2).unwrap();

    for query in &queries {
        let exact = tree.nn_search(query);
        let approximate = tree.ann_search(query, 1.0);
        assert_eq!(exact, approximate, "query {query:?}");
    }
}

/// A loose `alpha` may return a worse neighbor, but never a better-than-exact
/// one, and always a real center at its true distance.
#[test]
fn ann_result_is_a_real_center(){
    let centers = common::data_gen::tabular(32, 3, -5.0, 5.0, 21);
    let queries = common::data_gen::tabular(200, 3, -6.0, 6.0, 22);
    let tree = KdTree::build(&centers, DistanceKind::L2).unwrap();

    for query in &queries {
        let (exact_id, exact_d) = tree.nn_search(query);
        let (id, d) = tree.ann_search(query, 2.0);
        assert!(id < centers.len());
        assert!(approx_eq!(f32, d, vectors::euclidean(&centers[id], query), epsilon = 1e-5));
        assert!(d >= exact_d - 1e-5, "query {query:?}: {d} < {exact_d} from {exact_id}");
    }
}

/// Centers that collapse onto a line (all equal on one axis) must not blow up
/// the median selection during construction.
#[test]
fn degenerate_axis() {
    let centers = (0..64).map(|i| vec![3.0, i as f32]).collect::<Vec<_>>();
    let tree = KdTree::build(&centers, DistanceKind::L2).unwrap();

    let (id, d) = tree.nn_search(&[3.0_f32, 17.2]);
    assert_eq!(id, 17);
    assert!(approx_eq!(f32, d, 0.2, epsilon = 1e-4));
}
