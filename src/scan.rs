//! Shared scan kernel (§4.H).
//!
//! A single linear pass evaluates any number of half-open range selects
//! plus up to one each of `{min, max, sum}` over the same value-vector,
//! optionally restricted to the positions named by a position-vector.
//! The sequential and parallel entry points share [`scan_range`] as the
//! per-chunk primitive; the parallel path chunks the domain (row indices
//! when there is no position-vector, slots of the position-vector when
//! there is one) and concatenates per-chunk outputs in chunk order, which
//! is what keeps output ordering guarantees intact (§5).

use std::sync::Mutex;

use crate::btree::BPlusTree;
use crate::config::Config;
use crate::pool::WorkerPool;
use crate::search::{abinsearch, binsearch, Align};

/// A half-open `[lo, hi)` range predicate, bounds already resolved from
/// the external `NULL → LONG_MIN/LONG_MAX` contract.
#[derive(Debug, Clone, Copy)]
pub struct SelectSpec {
    pub lo: i64,
    pub hi: i64,
}

/// `NULL` lower bound resolves to "unbounded below".
pub fn resolve_lo(v: Option<i64>) -> i64 {
    v.unwrap_or(i64::MIN)
}

/// `NULL` upper bound resolves to "unbounded above".
pub fn resolve_hi(v: Option<i64>) -> i64 {
    v.unwrap_or(i64::MAX)
}

/// Which aggregates to compute in a single pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggFlags {
    pub min: bool,
    pub max: bool,
    pub sum: bool,
}

/// Result of a shared scan: one matched-index array per select, plus any
/// requested aggregate accumulators.
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    pub selects: Vec<Vec<usize>>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub sum: Option<i64>,
}

#[derive(Clone)]
struct ChunkResult {
    selects: Vec<Vec<usize>>,
    min: Option<i64>,
    max: Option<i64>,
    sum: Option<i64>,
}

/// Scan the domain `range`, which indexes the position-vector when one is
/// given, or the data array directly otherwise.
fn scan_range(
    data: &[i32],
    positions: Option<&[usize]>,
    range: std::ops::Range<usize>,
    selects: &[SelectSpec],
    agg: AggFlags,
) -> ChunkResult {
    let mut sel_out: Vec<Vec<usize>> = vec![Vec::new(); selects.len()];
    let mut min: Option<i64> = None;
    let mut max: Option<i64> = None;
    let mut sum: i64 = 0;

    for i in range {
        let (row, v) = match positions {
            Some(pos) => {
                let row = pos[i];
                (row, data[row])
            }
            None => (i, data[i]),
        };
        let v64 = i64::from(v);
        if agg.min {
            min = Some(min.map_or(v64, |m| m.min(v64)));
        }
        if agg.max {
            max = Some(max.map_or(v64, |m| m.max(v64)));
        }
        if agg.sum {
            sum += v64;
        }
        for (si, spec) in selects.iter().enumerate() {
            if v64 >= spec.lo && v64 < spec.hi {
                sel_out[si].push(row);
            }
        }
    }

    ChunkResult {
        selects: sel_out,
        min,
        max,
        sum: if agg.sum { Some(sum) } else { None },
    }
}

fn combine(chunks: Vec<ChunkResult>, n_selects: usize) -> ScanOutput {
    let mut selects = vec![Vec::new(); n_selects];
    let mut min = None;
    let mut max = None;
    let mut sum = None;
    for c in chunks {
        for (si, v) in c.selects.into_iter().enumerate() {
            selects[si].extend(v);
        }
        if let Some(m) = c.min {
            min = Some(min.map_or(m, |cur: i64| cur.min(m)));
        }
        if let Some(m) = c.max {
            max = Some(max.map_or(m, |cur: i64| cur.max(m)));
        }
        if let Some(s) = c.sum {
            sum = Some(sum.unwrap_or(0i64) + s);
        }
    }
    ScanOutput { selects, min, max, sum }
}

/// Sequential shared scan over the whole domain.
pub fn shared_scan(data: &[i32], positions: Option<&[usize]>, selects: &[SelectSpec], agg: AggFlags) -> ScanOutput {
    let domain_len = positions.map_or(data.len(), |p| p.len());
    let chunk = scan_range(data, positions, 0..domain_len, selects, agg);
    combine(vec![chunk], selects.len())
}

/// SAFETY: the caller (`shared_scan_parallel`) only uses the returned
/// reference inside the lifetime of the completion barrier it drives, so
/// every closure referencing it has finished running (and the reference
/// has been dropped) before the real borrow `'a` could possibly end. This
/// is the same pattern scoped-thread libraries use internally.
unsafe fn extend_lifetime<'a, T: ?Sized>(r: &'a T) -> &'static T {
    unsafe { std::mem::transmute(r) }
}

/// Parallel shared scan, chunked across the worker pool per §4.H, with
/// each chunk sized to roughly `scan_chunk_target_bytes`.
pub fn shared_scan_parallel(
    pool: &WorkerPool,
    data: &[i32],
    positions: Option<&[usize]>,
    selects: &[SelectSpec],
    agg: AggFlags,
    cfg: &Config,
) -> ScanOutput {
    let domain_len = positions.map_or(data.len(), |p| p.len());
    if domain_len == 0 {
        return combine(Vec::new(), selects.len());
    }
    let chunk_rows = (cfg.scan_chunk_target_bytes / std::mem::size_of::<i32>()).max(1);
    let n_chunks = domain_len.div_ceil(chunk_rows);

    let results: Mutex<Vec<Option<ChunkResult>>> = Mutex::new(vec![None; n_chunks]);
    let results_ref: &'static Mutex<Vec<Option<ChunkResult>>> = unsafe { extend_lifetime(&results) };
    let data_static: &'static [i32] = unsafe { extend_lifetime(data) };
    let positions_static: Option<&'static [usize]> = positions.map(|p| unsafe { extend_lifetime(p) });
    let selects_owned = selects.to_vec();

    let jobs: Vec<_> = (0..n_chunks)
        .map(|chunk_idx| {
            let lo = chunk_idx * chunk_rows;
            let hi = (lo + chunk_rows).min(domain_len);
            let selects_owned = selects_owned.clone();
            move || {
                let r = scan_range(data_static, positions_static, lo..hi, &selects_owned, agg);
                results_ref.lock().unwrap()[chunk_idx] = Some(r);
            }
        })
        .collect();

    pool.run_scan_barrier(jobs);

    let chunks: Vec<ChunkResult> = results.into_inner().unwrap().into_iter().map(|c| c.expect("all chunks completed")).collect();
    combine(chunks, selects.len())
}

/// Unclustered-sorted specialization: `abinsearch` the lower bound
/// (left-aligned), then walk the sort permutation forward until the
/// value reaches `hi`.
pub fn select_unclustered_sorted(data: &[i32], sorter: &[usize], lo: i64, hi: i64) -> Vec<usize> {
    if hi <= lo {
        return Vec::new();
    }
    let mut start = abinsearch(data, sorter, lo, Align::Left);
    let mut out = Vec::new();
    while start < sorter.len() {
        let row = sorter[start];
        let v = i64::from(data[row]);
        if v >= hi {
            break;
        }
        out.push(row);
        start += 1;
    }
    out
}

/// Unclustered-btree specialization: a B+-tree range search, then, when a
/// position-vector restricts the domain, filtered down to the rows the
/// position-vector actually names.
pub fn select_unclustered_btree(tree: &BPlusTree, lo: i64, hi: i64, positions: Option<&[usize]>) -> Vec<usize> {
    let mut out = Vec::new();
    tree.range_search(lo, hi, &mut out);
    if let Some(pos) = positions {
        let allowed: std::collections::HashSet<usize> = pos.iter().copied().collect();
        out.retain(|r| allowed.contains(r));
    }
    out
}

/// Clustered-sorted specialization: two left-aligned binary searches on
/// the (already sorted) column data materialize the half-open range
/// directly.
pub fn select_clustered_sorted(data: &[i32], lo: i64, hi: i64) -> Vec<usize> {
    if hi <= lo {
        return Vec::new();
    }
    let p_lo = binsearch(data, lo, Align::Left);
    let p_hi = binsearch(data, hi, Align::Left);
    (p_lo..p_hi).collect()
}

/// Clustered-btree specialization: the tree's contiguous-values range
/// search.
pub fn select_clustered_btree(tree: &BPlusTree, lo: i64, hi: i64) -> Vec<usize> {
    tree.range_search_contiguous(lo, hi)
}
