//! Utility functions for the crate.

use core::cmp::Ordering;

/// Pairs an identifier with a partially ordered value so the pair can be used
/// with `max_by_key`. Incomparable values lose the comparison, so `NaN`s never
/// win a maximum.
pub struct MaxItem<Id, T>(pub Id, pub T);

impl<Id, T: PartialOrd> PartialEq for MaxItem<Id, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<Id, T: PartialOrd> Eq for MaxItem<Id, T> {}

impl<Id, T: PartialOrd> PartialOrd for MaxItem<Id, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<Id, T: PartialOrd> Ord for MaxItem<Id, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.1.partial_cmp(&other.1).unwrap_or(Ordering::Less)
    }
}

/// The counterpart of [`MaxItem`] for use with `min_by_key`. Incomparable
/// values lose the comparison, so `NaN`s never win a minimum.
pub struct MinItem<Id, T>(pub Id, pub T);

impl<Id, T: PartialOrd> PartialEq for MinItem<Id, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<Id, T: PartialOrd> Eq for MinItem<Id, T> {}

impl<Id, T: PartialOrd> PartialOrd for MinItem<Id, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<Id, T: PartialOrd> Ord for MinItem<Id, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.1.partial_cmp(&other.1).unwrap_or(Ordering::Greater)
    }
}

/// Selects the `k`-th smallest element (zero-indexed) with QuickSelect.
///
/// The pivot is the median of the first, middle and last elements, and the
/// partition is three-way, so sorted and all-equal inputs stay linear instead
/// of degenerating quadratically.
///
/// Returns `None` when `k` is out of bounds.
///
/// # Arguments
///
/// * `data` - The data to select from.
/// * `k` - The zero-based rank of the element to select.
pub fn quick_select_k<T: PartialOrd + Copy>(data: &[T], k: usize) -> Option<T> {
    if k >= data.len() {
        return None;
    }

    let pivot = median_of_three(data);
    let (lesser, equal, greater) = partition(data, pivot);

    if k < lesser.len() {
        quick_select_k(&lesser, k)
    } else if k < lesser.len() + equal {
        Some(pivot)
    } else {
        quick_select_k(&greater, k - lesser.len() - equal)
    }
}

/// Finds the median value using [`quick_select_k`].
///
/// If the number of elements is even, this returns the lower of the two middle
/// elements. Returns `None` on empty input.
pub fn median<T: PartialOrd + Copy>(data: &[T]) -> Option<T> {
    if data.is_empty() {
        None
    } else {
        quick_select_k(data, (data.len() - 1) / 2)
    }
}

/// A helper for [`quick_select_k`].
///
/// Partitions the given data around the pivot value into:
/// - A vector of all values less than the pivot.
/// - The count of values equal to the pivot.
/// - A vector of all values greater than the pivot.
fn partition<T: PartialOrd + Copy>(data: &[T], pivot: T) -> (Vec<T>, usize, Vec<T>) {
    let mut lesser = Vec::new();
    let mut greater = Vec::new();
    let mut equal = 0;

    for &value in data {
        if value < pivot {
            lesser.push(value);
        } else if value > pivot {
            greater.push(value);
        } else {
            equal += 1;
        }
    }

    (lesser, equal, greater)
}

/// A helper for [`quick_select_k`].
///
/// Returns the median of the first, middle and last elements of `data`, which
/// must be non-empty.
fn median_of_three<T: PartialOrd + Copy>(data: &[T]) -> T {
    let (a, b, c) = (data[0], data[data.len() / 2], data[data.len() - 1]);

    if (a <= b && b <= c) || (c <= b && b <= a) {
        b
    } else if (b <= a && a <= c) || (c <= a && a <= b) {
        a
    } else {
        c
    }
}
