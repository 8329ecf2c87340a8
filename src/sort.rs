//! Sort primitives (§4.A).
//!
//! In-place hybrid quicksort and argsort, plus 2-way and k-way merge over
//! already-sorted runs. Not stable; switches to insertion sort below
//! [`Config::quicksort_insertion_cutoff`](crate::config::Config).

const DEFAULT_INSERTION_CUTOFF: usize = 15;

/// Sort `arr` ascending in place using median-of-three quicksort with an
/// explicit stack, falling back to insertion sort for small partitions.
pub fn quicksort(arr: &mut [i32]) {
    quicksort_with_cutoff(arr, DEFAULT_INSERTION_CUTOFF);
}

/// Same as [`quicksort`] with a caller-supplied insertion-sort cutoff.
pub fn quicksort_with_cutoff(arr: &mut [i32], cutoff: usize) {
    if arr.len() < 2 {
        return;
    }
    let mut stack: Vec<(usize, usize)> = vec![(0, arr.len() - 1)];
    while let Some((lo, hi)) = stack.pop() {
        if lo >= hi {
            continue;
        }
        if hi - lo + 1 <= cutoff {
            insertion_sort(&mut arr[lo..=hi]);
            continue;
        }
        let p = partition(arr, lo, hi);
        if p > 0 {
            stack.push((lo, p - 1));
        }
        stack.push((p + 1, hi));
    }
}

fn insertion_sort(arr: &mut [i32]) {
    for i in 1..arr.len() {
        let mut j = i;
        while j > 0 && arr[j - 1] > arr[j] {
            arr.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// Median-of-three partition: picks the median of `arr[lo]`, `arr[mid]`,
/// `arr[hi]` as pivot, moves it to `hi - 1`, partitions the rest, and
/// returns the final pivot index.
fn partition(arr: &mut [i32], lo: usize, hi: usize) -> usize {
    let mid = lo + (hi - lo) / 2;
    if arr[mid] < arr[lo] {
        arr.swap(mid, lo);
    }
    if arr[hi] < arr[lo] {
        arr.swap(hi, lo);
    }
    if arr[hi] < arr[mid] {
        arr.swap(hi, mid);
    }
    arr.swap(mid, hi);
    let pivot = arr[hi];
    let mut i = lo;
    for j in lo..hi {
        if arr[j] < pivot {
            arr.swap(i, j);
            i += 1;
        }
    }
    arr.swap(i, hi);
    i
}

/// Produce a permutation `perm` of `0..arr.len()` such that `arr[perm[i]]`
/// is ascending in `i`. `perm` must already be sized to `arr.len()`; its
/// initial contents are overwritten.
pub fn argsort(arr: &[i32], perm: &mut [usize]) {
    assert_eq!(arr.len(), perm.len());
    for (i, slot) in perm.iter_mut().enumerate() {
        *slot = i;
    }
    argsort_with_cutoff(arr, perm, DEFAULT_INSERTION_CUTOFF);
}

fn argsort_with_cutoff(arr: &[i32], perm: &mut [usize], cutoff: usize) {
    if perm.len() < 2 {
        return;
    }
    let mut stack: Vec<(usize, usize)> = vec![(0, perm.len() - 1)];
    while let Some((lo, hi)) = stack.pop() {
        if lo >= hi {
            continue;
        }
        if hi - lo + 1 <= cutoff {
            arg_insertion_sort(arr, &mut perm[lo..=hi]);
            continue;
        }
        let p = arg_partition(arr, perm, lo, hi);
        if p > 0 {
            stack.push((lo, p - 1));
        }
        stack.push((p + 1, hi));
    }
}

fn arg_insertion_sort(arr: &[i32], perm: &mut [usize]) {
    for i in 1..perm.len() {
        let mut j = i;
        while j > 0 && arr[perm[j - 1]] > arr[perm[j]] {
            perm.swap(j - 1, j);
            j -= 1;
        }
    }
}

fn arg_partition(arr: &[i32], perm: &mut [usize], lo: usize, hi: usize) -> usize {
    let mid = lo + (hi - lo) / 2;
    if arr[perm[mid]] < arr[perm[lo]] {
        perm.swap(mid, lo);
    }
    if arr[perm[hi]] < arr[perm[lo]] {
        perm.swap(hi, lo);
    }
    if arr[perm[hi]] < arr[perm[mid]] {
        perm.swap(hi, mid);
    }
    perm.swap(mid, hi);
    let pivot = arr[perm[hi]];
    let mut i = lo;
    for j in lo..hi {
        if arr[perm[j]] < pivot {
            perm.swap(i, j);
            i += 1;
        }
    }
    perm.swap(i, hi);
    i
}

/// Merge two adjacent ascending runs `arr[lo..mid]` and `arr[mid..hi]` into
/// one ascending run occupying `arr[lo..hi]`. Uses an auxiliary buffer
/// sized to the smaller half.
pub fn merge(arr: &mut [i32], lo: usize, mid: usize, hi: usize) {
    if lo >= mid || mid >= hi {
        return;
    }
    let left_len = mid - lo;
    let right_len = hi - mid;
    if left_len <= right_len {
        let mut buf = arr[lo..mid].to_vec();
        let mut i = 0usize; // index into buf
        let mut j = mid; // index into arr (right run)
        let mut k = lo; // write index
        while i < buf.len() && j < hi {
            if buf[i] <= arr[j] {
                arr[k] = buf[i];
                i += 1;
            } else {
                arr[k] = arr[j];
                j += 1;
            }
            k += 1;
        }
        while i < buf.len() {
            arr[k] = buf[i];
            i += 1;
            k += 1;
        }
        // remaining right-side elements are already in place
    } else {
        let mut buf = arr[mid..hi].to_vec();
        let mut i = (mid - lo) as isize - 1; // index into left run, from the end
        let mut j = buf.len() as isize - 1; // index into buf, from the end
        let mut k = hi as isize - 1; // write index, from the end
        while i >= 0 && j >= 0 {
            if arr[lo + i as usize] > buf[j as usize] {
                arr[k as usize] = arr[lo + i as usize];
                i -= 1;
            } else {
                arr[k as usize] = buf[j as usize];
                j -= 1;
            }
            k -= 1;
        }
        while j >= 0 {
            arr[k as usize] = buf[j as usize];
            j -= 1;
            k -= 1;
        }
    }
}

/// Arg-merge two adjacent ascending runs of a permutation, `perm[lo..mid]`
/// and `perm[mid..hi]`, keyed by `arr[perm[i]]`, into one ascending run.
pub fn arg_merge(arr: &[i32], perm: &mut [usize], lo: usize, mid: usize, hi: usize) {
    if lo >= mid || mid >= hi {
        return;
    }
    let left_len = mid - lo;
    let right_len = hi - mid;
    if left_len <= right_len {
        let buf = perm[lo..mid].to_vec();
        let mut i = 0usize;
        let mut j = mid;
        let mut k = lo;
        while i < buf.len() && j < hi {
            if arr[buf[i]] <= arr[perm[j]] {
                perm[k] = buf[i];
                i += 1;
            } else {
                perm[k] = perm[j];
                j += 1;
            }
            k += 1;
        }
        while i < buf.len() {
            perm[k] = buf[i];
            i += 1;
            k += 1;
        }
    } else {
        let buf = perm[mid..hi].to_vec();
        let mut i = (mid - lo) as isize - 1;
        let mut j = buf.len() as isize - 1;
        let mut k = hi as isize - 1;
        while i >= 0 && j >= 0 {
            if arr[perm[lo + i as usize]] > arr[buf[j as usize]] {
                perm[k as usize] = perm[lo + i as usize];
                i -= 1;
            } else {
                perm[k as usize] = buf[j as usize];
                j -= 1;
            }
            k -= 1;
        }
        while j >= 0 {
            perm[k as usize] = buf[j as usize];
            j -= 1;
            k -= 1;
        }
    }
}

/// K-way merge of `runs` (each a `(lo, hi)` half-open range already
/// ascending in `arr`) via divide-and-conquer, recursively halving `k`.
/// Ranges must be contiguous and given in left-to-right order.
pub fn kway_merge(arr: &mut [i32], runs: &[(usize, usize)]) {
    if runs.len() <= 1 {
        return;
    }
    if runs.len() == 2 {
        merge(arr, runs[0].0, runs[0].1, runs[1].1);
        return;
    }
    let mid = runs.len() / 2;
    kway_merge(arr, &runs[..mid]);
    kway_merge(arr, &runs[mid..]);
    merge(arr, runs[0].0, runs[mid].0, runs[runs.len() - 1].1);
}

/// K-way arg-merge, the [`kway_merge`] analogue over a permutation.
pub fn kway_arg_merge(arr: &[i32], perm: &mut [usize], runs: &[(usize, usize)]) {
    if runs.len() <= 1 {
        return;
    }
    if runs.len() == 2 {
        arg_merge(arr, perm, runs[0].0, runs[0].1, runs[1].1);
        return;
    }
    let mid = runs.len() / 2;
    kway_arg_merge(arr, perm, &runs[..mid]);
    kway_arg_merge(arr, perm, &runs[mid..]);
    arg_merge(arr, perm, runs[0].0, runs[mid].0, runs[runs.len() - 1].1);
}
