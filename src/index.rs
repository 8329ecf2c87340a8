//! Column index manager (§4.F).
//!
//! Each column carries one of five index states. Clustered variants also
//! reorder every sibling column in the table so the physical row order
//! matches the primary column's sort order; unclustered variants leave
//! the physical data untouched and carry a separate sort permutation.

use crate::btree::BPlusTree;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::sort::{argsort, arg_merge};
use crate::storage::table::Table;

/// The five index states a column can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    None,
    UnclusteredSorted,
    UnclusteredBtree,
    ClusteredSorted,
    ClusteredBtree,
}

impl IndexType {
    pub fn is_clustered(self) -> bool {
        matches!(self, IndexType::ClusteredSorted | IndexType::ClusteredBtree)
    }

    pub fn has_sorter(self) -> bool {
        matches!(self, IndexType::UnclusteredSorted | IndexType::UnclusteredBtree)
    }

    pub fn has_tree(self) -> bool {
        matches!(self, IndexType::UnclusteredBtree | IndexType::ClusteredBtree)
    }
}

/// Build the argsort permutation for `col_idx`'s full `[0, n_rows)` range.
fn full_sorter(table: &Table, col_idx: usize, cfg: &Config) -> Vec<usize> {
    let n = table.n_rows;
    let mut perm: Vec<usize> = (0..n).collect();
    let data = &table.columns[col_idx].data()[..n];
    argsort(data, &mut perm);
    let _ = cfg;
    perm
}

/// Apply `perm` (a permutation of `[0, n_rows)`) to every column's live
/// prefix: each column needs a temporary copy of its own data to reorder
/// from (§4.F propagate_sorter).
fn propagate_sorter(table: &mut Table, perm: &[usize]) -> CoreResult<()> {
    let n = table.n_rows;
    for col in &mut table.columns {
        let original = col.data()[..n].to_vec();
        let dst = &mut col.data_mut()[..n];
        for (i, &src_row) in perm.iter().enumerate() {
            dst[i] = original[src_row];
        }
    }
    Ok(())
}

/// Initialize `col_idx`'s index to `index_type`. `skip_sort` means the
/// data is already physically ordered (the launch path): clustered
/// variants skip the reorder and just build what they need from the
/// existing order.
pub fn init_index(table: &mut Table, col_idx: usize, index_type: IndexType, skip_sort: bool, cfg: &Config) -> CoreResult<()> {
    if table.columns[col_idx].index_type != IndexType::None {
        return Err(CoreError::IndexAlreadyExists(table.name.clone(), table.columns[col_idx].name.clone()));
    }
    if index_type.is_clustered() && table.primary.is_some() {
        return Err(CoreError::ClusteredIndexExists(
            table.name.clone(),
            table.columns[table.primary.unwrap()].name.clone(),
        ));
    }

    match index_type {
        IndexType::None => {}
        IndexType::UnclusteredSorted => {
            let perm = full_sorter(table, col_idx, cfg);
            table.columns[col_idx].sorter = Some(perm);
        }
        IndexType::UnclusteredBtree => {
            let perm = full_sorter(table, col_idx, cfg);
            let n = table.n_rows;
            let data = table.columns[col_idx].data()[..n].to_vec();
            let pairs: Vec<(i64, usize)> = perm.iter().map(|&i| (i64::from(data[i]), i)).collect();
            let tree = BPlusTree::bulk_build(cfg.btree_order, &pairs);
            table.columns[col_idx].sorter = Some(perm);
            table.columns[col_idx].tree = Some(tree);
        }
        IndexType::ClusteredSorted => {
            if !skip_sort {
                let perm = full_sorter(table, col_idx, cfg);
                propagate_sorter(table, &perm)?;
            }
            table.primary = Some(col_idx);
        }
        IndexType::ClusteredBtree => {
            if !skip_sort {
                let perm = full_sorter(table, col_idx, cfg);
                propagate_sorter(table, &perm)?;
            }
            table.primary = Some(col_idx);
            let n = table.n_rows;
            let data = table.columns[col_idx].data()[..n].to_vec();
            let pairs: Vec<(i64, usize)> = data.iter().enumerate().map(|(i, &v)| (i64::from(v), i)).collect();
            table.columns[col_idx].tree = Some(BPlusTree::bulk_build(cfg.btree_order, &pairs));
        }
    }
    table.columns[col_idx].index_type = index_type;

    if index_type.is_clustered() {
        if skip_sort {
            // every column is being restored independently; nothing more to do
        } else {
            rebuild_unclustered_indexes(table, Some(col_idx), cfg)?;
        }
    }
    Ok(())
}

/// Append-only case (§4.F update_sorter): argsort the new tail
/// `[old_n_rows, n_rows)` then 2-way arg-merge it with the existing head.
/// Only repairs the sorter permutation — callers that also carry a B+-tree
/// decide separately whether to rebuild it wholesale (load conclude) or
/// insert the new keys one at a time (single-row insert).
pub fn update_sorter_append(table: &mut Table, col_idx: usize, old_n_rows: usize, _cfg: &Config) -> CoreResult<()> {
    let it = table.columns[col_idx].index_type;
    if !it.has_sorter() {
        return Ok(());
    }
    let n = table.n_rows;
    let data = table.columns[col_idx].data()[..n].to_vec();
    let tail_len = n - old_n_rows;
    let mut tail_perm: Vec<usize> = (old_n_rows..n).collect();
    if tail_len > 0 {
        let tail_data = &data[old_n_rows..n];
        let mut local_perm = vec![0usize; tail_len];
        argsort(tail_data, &mut local_perm);
        tail_perm = local_perm.iter().map(|&i| i + old_n_rows).collect();
    }

    let sorter = table.columns[col_idx].sorter.get_or_insert_with(Vec::new);
    sorter.extend_from_slice(&tail_perm);
    let mid = old_n_rows;
    let hi = sorter.len();
    if mid > 0 && mid < hi {
        arg_merge(&data, sorter, 0, mid, hi);
    }
    Ok(())
}

/// Single-row insert case: descend and insert one key into the existing
/// B+-tree rather than rebuilding it, so a clustered-index-free insert
/// stays O(log n) in the tree (§4.F, "update each unclustered index
/// incrementally"). Call after [`update_sorter_append`] has placed `row`
/// in the sorter.
pub fn insert_into_tree(table: &mut Table, col_idx: usize, row: usize) {
    let col = &mut table.columns[col_idx];
    if !col.index_type.has_tree() {
        return;
    }
    let key = i64::from(col.data()[row]);
    col.tree.as_mut().expect("has_tree() implies an initialized tree").insert(key, row);
}

/// Load-conclude case: rebuild `col_idx`'s B+-tree from scratch against its
/// current (already-merged) sorter. A load can append many rows at once,
/// so this stays a bulk rebuild rather than per-row inserts, matching how
/// the original concludes a load for a B+-tree-indexed column.
fn rebuild_tree_from_sorter(table: &mut Table, col_idx: usize, cfg: &Config) {
    let it = table.columns[col_idx].index_type;
    if !it.has_tree() {
        return;
    }
    let n = table.n_rows;
    let data = table.columns[col_idx].data()[..n].to_vec();
    let sorter = table.columns[col_idx].sorter.clone().unwrap_or_default();
    let pairs: Vec<(i64, usize)> = sorter.iter().map(|&i| (i64::from(data[i]), i)).collect();
    table.columns[col_idx].tree = Some(BPlusTree::bulk_build(cfg.btree_order, &pairs));
}

/// Load-conclude entry point for an unclustered column: merge the new tail
/// into the sorter, then rebuild the tree (if any) from the repaired
/// sorter in one pass.
pub fn conclude_unclustered_append(table: &mut Table, col_idx: usize, old_n_rows: usize, cfg: &Config) -> CoreResult<()> {
    update_sorter_append(table, col_idx, old_n_rows, cfg)?;
    rebuild_tree_from_sorter(table, col_idx, cfg);
    Ok(())
}

/// Delete repair for unclustered, non-primary columns (§4.F): given the
/// old-row→new-row map built while compacting the table's data (`None` for
/// removed rows), repair each indexed column's sorter in one O(n) pass —
/// dropping entries for removed rows and remapping the survivors — rather
/// than re-deriving it from scratch. B+-tree columns then rebuild their
/// tree from the now-correct sorter.
pub fn repair_unclustered_after_delete(table: &mut Table, old_to_new: &[Option<usize>], cfg: &Config) {
    for ci in 0..table.columns.len() {
        let it = table.columns[ci].index_type;
        if it.is_clustered() || !it.has_sorter() {
            continue;
        }
        if let Some(old_sorter) = table.columns[ci].sorter.take() {
            let new_sorter: Vec<usize> = old_sorter.into_iter().filter_map(|old_row| old_to_new[old_row]).collect();
            table.columns[ci].sorter = Some(new_sorter);
        }
        rebuild_tree_from_sorter(table, ci, cfg);
    }
}

/// Free and reinitialize every non-primary column's index, used after any
/// mutation that moves rows around.
pub fn rebuild_unclustered_indexes(table: &mut Table, skip_col: Option<usize>, cfg: &Config) -> CoreResult<()> {
    let targets: Vec<usize> = (0..table.columns.len())
        .filter(|&i| Some(i) != skip_col && !table.columns[i].index_type.is_clustered())
        .collect();
    for i in targets {
        let it = table.columns[i].index_type;
        if it == IndexType::None {
            continue;
        }
        free_index(table, i);
        init_index(table, i, it, false, cfg)?;
    }
    Ok(())
}

/// Release `sorter`/`tree` and reset to `None`, without touching column
/// data.
pub fn free_index(table: &mut Table, col_idx: usize) {
    let col = &mut table.columns[col_idx];
    col.sorter = None;
    col.tree = None;
    col.index_type = IndexType::None;
    if table.primary == Some(col_idx) {
        table.primary = None;
    }
}
