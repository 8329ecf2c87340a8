//! Join kernel (§4.I).
//!
//! Every entry point takes two `(value-vector, position-vector)` pairs
//! and produces two parallel output index-arrays pairing matching rows.
//! `join_hash` is the dispatch heuristic: naive hash below
//! [`Config::hash_join_naive_cutoff`], radix hash above it.

use std::sync::Mutex;

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::pool::WorkerPool;

/// Quadratic nested-loop join.
pub fn join_nested_loop(data1: &[i32], pos1: &[usize], data2: &[i32], pos2: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &r1 in pos1 {
        for &r2 in pos2 {
            if data1[r1] == data2[r2] {
                left.push(r1);
                right.push(r2);
            }
        }
    }
    (left, right)
}

/// Build a hash table on the smaller side (`value -> build-side rows`),
/// probe with the larger side, and emit `(left_row, right_row)` pairs in
/// the caller's left/right orientation regardless of which side was
/// actually built.
pub fn join_naive_hash(data1: &[i32], pos1: &[usize], data2: &[i32], pos2: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    if pos1.len() <= pos2.len() {
        let mut table: std::collections::HashMap<i32, Vec<usize>> = std::collections::HashMap::with_capacity(pos1.len());
        for &r1 in pos1 {
            table.entry(data1[r1]).or_default().push(r1);
        }
        for &r2 in pos2 {
            if let Some(rows) = table.get(&data2[r2]) {
                for &r1 in rows {
                    left.push(r1);
                    right.push(r2);
                }
            }
        }
    } else {
        let mut table: std::collections::HashMap<i32, Vec<usize>> = std::collections::HashMap::with_capacity(pos2.len());
        for &r2 in pos2 {
            table.entry(data2[r2]).or_default().push(r2);
        }
        for &r1 in pos1 {
            if let Some(rows) = table.get(&data1[r1]) {
                for &r2 in rows {
                    left.push(r1);
                    right.push(r2);
                }
            }
        }
    }
    (left, right)
}

fn low_bits(v: i32, b: u32) -> usize {
    ((v as u32) & ((1u32 << b) - 1)) as usize
}

/// Partition `positions` by the low `b` bits of `data[row]`: a histogram,
/// a prefix sum, then a scatter into contiguous partition buckets.
fn partition_by_low_bits(data: &[i32], positions: &[usize], b: u32) -> Vec<Vec<usize>> {
    let n_parts = 1usize << b;
    let mut hist = vec![0usize; n_parts];
    for &row in positions {
        hist[low_bits(data[row], b)] += 1;
    }
    let mut offsets = vec![0usize; n_parts + 1];
    for i in 0..n_parts {
        offsets[i + 1] = offsets[i] + hist[i];
    }
    let mut scattered = vec![0usize; positions.len()];
    let mut cursor = offsets.clone();
    for &row in positions {
        let p = low_bits(data[row], b);
        scattered[cursor[p]] = row;
        cursor[p] += 1;
    }
    (0..n_parts).map(|i| scattered[offsets[i]..offsets[i + 1]].to_vec()).collect()
}

/// SAFETY: see the identical justification in `scan::extend_lifetime` —
/// every closure built from this reference is drained by the completion
/// barrier before the function returns.
unsafe fn extend_lifetime<'a, T: ?Sized>(r: &'a T) -> &'static T {
    unsafe { std::mem::transmute(r) }
}

/// Partition both sides by the low bits of their key, dispatch one
/// hash-and-probe task per partition to the worker pool, and concatenate
/// results by partition index.
pub fn join_radix_hash(
    cfg: &Config,
    pool: &WorkerPool,
    data1: &[i32],
    pos1: &[usize],
    data2: &[i32],
    pos2: &[usize],
) -> (Vec<usize>, Vec<usize>) {
    let max_n = pos1.len().max(pos2.len());
    let b = cfg.radix_bits_for(max_n);
    let parts1 = partition_by_low_bits(data1, pos1, b);
    let parts2 = partition_by_low_bits(data2, pos2, b);
    let n_parts = parts1.len();

    let results: Mutex<Vec<Option<(Vec<usize>, Vec<usize>)>>> = Mutex::new(vec![None; n_parts]);
    let results_ref: &'static Mutex<Vec<Option<(Vec<usize>, Vec<usize>)>>> = unsafe { extend_lifetime(&results) };
    let data1_static: &'static [i32] = unsafe { extend_lifetime(data1) };
    let data2_static: &'static [i32] = unsafe { extend_lifetime(data2) };

    let jobs: Vec<_> = (0..n_parts)
        .map(|i| {
            let p1 = parts1[i].clone();
            let p2 = parts2[i].clone();
            move || {
                let pair = join_naive_hash(data1_static, &p1, data2_static, &p2);
                results_ref.lock().unwrap()[i] = Some(pair);
            }
        })
        .collect();
    pool.run_join_barrier(jobs);

    let mut left = Vec::new();
    let mut right = Vec::new();
    for pair in results.into_inner().unwrap() {
        let (l, r) = pair.expect("all partitions completed");
        left.extend(l);
        right.extend(r);
    }
    (left, right)
}

/// Dispatch heuristic (§4.I "hash"): naive hash below the cutoff, radix
/// hash (requiring a worker pool) above it.
pub fn join_hash(
    cfg: &Config,
    pool: Option<&WorkerPool>,
    data1: &[i32],
    pos1: &[usize],
    data2: &[i32],
    pos2: &[usize],
) -> CoreResult<(Vec<usize>, Vec<usize>)> {
    let max_n = pos1.len().max(pos2.len());
    if max_n < cfg.hash_join_naive_cutoff {
        Ok(join_naive_hash(data1, pos1, data2, pos2))
    } else {
        let pool = pool.ok_or(CoreError::NoWorkerPool)?;
        Ok(join_radix_hash(cfg, pool, data1, pos1, data2, pos2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn as_set(left: &[usize], right: &[usize]) -> HashSet<(usize, usize)> {
        left.iter().copied().zip(right.iter().copied()).collect()
    }

    #[test]
    fn scenario_radix_join() {
        let data1 = vec![1, 2, 3, 4];
        let data2 = vec![2, 3, 5];
        let pos1: Vec<usize> = (0..4).collect();
        let pos2: Vec<usize> = (0..3).collect();
        let cfg = Config::default();
        let pool = WorkerPool::new(2, 16);
        let (l, r) = join_radix_hash(&cfg, &pool, &data1, &pos1, &data2, &pos2);
        assert_eq!(as_set(&l, &r), HashSet::from([(1, 0), (2, 1)]));
    }

    #[test]
    fn all_three_algorithms_agree() {
        let data1: Vec<i32> = (0..200).map(|x| x % 37).collect();
        let data2: Vec<i32> = (0..150).map(|x| (x * 3) % 37).collect();
        let pos1: Vec<usize> = (0..data1.len()).collect();
        let pos2: Vec<usize> = (0..data2.len()).collect();

        let expected: HashSet<(usize, usize)> = pos1
            .iter()
            .flat_map(|&i| pos2.iter().filter(move |&&j| data1[i] == data2[j]).map(move |&j| (i, j)))
            .collect();

        let (l, r) = join_nested_loop(&data1, &pos1, &data2, &pos2);
        assert_eq!(as_set(&l, &r), expected);

        let (l, r) = join_naive_hash(&data1, &pos1, &data2, &pos2);
        assert_eq!(as_set(&l, &r), expected);

        let cfg = Config::default();
        let pool = WorkerPool::new(4, 64);
        let (l, r) = join_radix_hash(&cfg, &pool, &data1, &pos1, &data2, &pos2);
        assert_eq!(as_set(&l, &r), expected);
    }

    #[test]
    fn dispatch_uses_naive_below_cutoff() {
        let data1 = vec![1, 2, 3];
        let data2 = vec![2, 3];
        let pos1 = vec![0, 1, 2];
        let pos2 = vec![0, 1];
        let cfg = Config::default();
        let (l, r) = join_hash(&cfg, None, &data1, &pos1, &data2, &pos2).unwrap();
        assert_eq!(as_set(&l, &r), HashSet::from([(1, 0), (2, 1)]));
    }

    #[test]
    fn dispatch_above_cutoff_requires_pool() {
        let data1 = vec![1; 200_000];
        let data2 = vec![1; 10];
        let pos1: Vec<usize> = (0..data1.len()).collect();
        let pos2: Vec<usize> = (0..data2.len()).collect();
        let cfg = Config::default();
        let err = join_hash(&cfg, None, &data1, &pos1, &data2, &pos2).unwrap_err();
        assert!(matches!(err, CoreError::NoWorkerPool));
    }
}
