//! Binary search (§4.B).
//!
//! Left-aligned search returns the lowest index `i` with `arr[i-1] < key
//! <= arr[i]`; right-aligned returns the lowest `i` with `arr[i-1] <= key
//! < arr[i]`. Both treat `i32::MIN`/`i32::MAX` as short-circuited
//! sentinels for "below everything"/"above everything".

/// Search alignment, controlling which side of a run of duplicates the
/// returned index lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Lowest `i` such that `arr[i-1] < key <= arr[i]`.
    Left,
    /// Lowest `i` such that `arr[i-1] <= key < arr[i]`.
    Right,
}

/// Binary search a sorted `arr` for `key`, returning an insertion point per
/// `align`. `arr` must be ascending; duplicates are handled by `align`.
pub fn binsearch(arr: &[i32], key: i64, align: Align) -> usize {
    if arr.is_empty() {
        return 0;
    }
    if key <= i64::from(i32::MIN) {
        return 0;
    }
    if key > i64::from(i32::MAX) {
        return arr.len();
    }
    let mut lo = 0usize;
    let mut hi = arr.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let v = i64::from(arr[mid]);
        let go_left = match align {
            Align::Left => v >= key,
            Align::Right => v > key,
        };
        if go_left {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

/// Indirect binary search: compares `key` against `arr[perm[i]]`, i.e.
/// searches a column through its argsort permutation without reordering
/// the column itself.
pub fn abinsearch(arr: &[i32], perm: &[usize], key: i64, align: Align) -> usize {
    if perm.is_empty() {
        return 0;
    }
    if key <= i64::from(i32::MIN) {
        return 0;
    }
    if key > i64::from(i32::MAX) {
        return perm.len();
    }
    let mut lo = 0usize;
    let mut hi = perm.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let v = i64::from(arr[perm[mid]]);
        let go_left = match align {
            Align::Left => v >= key,
            Align::Right => v > key,
        };
        if go_left {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn left_align_lower_bound() {
        let arr = [10, 10, 20, 20, 20, 30];
        assert_eq!(binsearch(&arr, 15, Align::Left), 2);
        assert_eq!(binsearch(&arr, 20, Align::Left), 2);
        assert_eq!(binsearch(&arr, 10, Align::Left), 0);
    }

    #[test]
    fn right_align_upper_bound() {
        let arr = [10, 10, 20, 20, 20, 30];
        assert_eq!(binsearch(&arr, 20, Align::Right), 5);
        assert_eq!(binsearch(&arr, 10, Align::Right), 2);
        assert_eq!(binsearch(&arr, 30, Align::Right), 6);
    }

    #[test]
    fn sentinels_short_circuit() {
        let arr = [1, 2, 3];
        assert_eq!(binsearch(&arr, i64::from(i32::MIN), Align::Left), 0);
        assert_eq!(binsearch(&arr, i64::from(i32::MAX) + 1, Align::Right), 3);
    }

    #[test]
    fn empty_array() {
        let arr: [i32; 0] = [];
        assert_eq!(binsearch(&arr, 5, Align::Left), 0);
        assert_eq!(binsearch(&arr, 5, Align::Right), 0);
    }

    #[test]
    fn abinsearch_through_permutation() {
        let arr = [30, 10, 20, 10, 20];
        // ascending order of arr via perm: 10,10,20,20,30 -> positions 1,3,2,4,0
        let perm = [1usize, 3, 2, 4, 0];
        assert_eq!(abinsearch(&arr, &perm, 15, Align::Left), 2);
        assert_eq!(abinsearch(&arr, &perm, 20, Align::Right), 4);
    }

    proptest! {
        #[test]
        fn prop_left_is_leftmost_insertion_point(mut v in proptest::collection::vec(any::<i32>(), 0..200), key in any::<i32>()) {
            v.sort();
            let idx = binsearch(&v, i64::from(key), Align::Left);
            prop_assert!(idx <= v.len());
            if idx > 0 {
                prop_assert!(v[idx - 1] < key);
            }
            if idx < v.len() {
                prop_assert!(v[idx] >= key);
            }
        }

        #[test]
        fn prop_right_is_rightmost_insertion_point(mut v in proptest::collection::vec(any::<i32>(), 0..200), key in any::<i32>()) {
            v.sort();
            let idx = binsearch(&v, i64::from(key), Align::Right);
            prop_assert!(idx <= v.len());
            if idx > 0 {
                prop_assert!(v[idx - 1] <= key);
            }
            if idx < v.len() {
                prop_assert!(v[idx] > key);
            }
        }
    }
}
