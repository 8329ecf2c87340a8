//! Tunable size constants (§6 of the design).
//!
//! Collects the magic numbers the rest of the crate would otherwise
//! scatter inline, with defaults matching the external interface contract.

/// Engine-wide tunables. `Config::default()` matches the documented
/// external interface exactly; tests and benchmarks may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum length, in bytes, of a database/table/column name.
    pub max_name_len: usize,
    /// Maximum length, in bytes, of a session handle name.
    pub max_handle_name_len: usize,
    /// Initial row capacity given to a newly created table.
    pub initial_table_capacity: usize,
    /// Factor by which table capacity doubles on expand.
    pub table_growth_factor: usize,
    /// Factor controlling when a table's capacity is halved on shrink.
    pub table_shrink_factor: usize,
    /// Initial capacity of each of a session's three handle tables.
    pub initial_handle_capacity: usize,
    /// Growth factor for handle tables.
    pub handle_growth_factor: usize,
    /// B+ tree order (max children per internal node).
    pub btree_order: usize,
    /// Radix bits used when `max(|A|, |B|) < 500_000`.
    pub radix_bits_small: u32,
    /// Radix bits used when `max(|A|, |B|) < 2_000_000`.
    pub radix_bits_medium: u32,
    /// Radix bits used otherwise.
    pub radix_bits_large: u32,
    /// Row-count cutoff below which "hash join" dispatches to naive hash
    /// instead of radix hash.
    pub hash_join_naive_cutoff: usize,
    /// Capacity of the worker pool's task queue.
    pub task_queue_depth: usize,
    /// Row batch size used by the load operator's append-rows phase.
    pub load_batch_rows: usize,
    /// Partition size below which quicksort falls back to insertion sort.
    pub quicksort_insertion_cutoff: usize,
    /// Target number of bytes of input per parallel scan chunk.
    pub scan_chunk_target_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_name_len: 64,
            max_handle_name_len: 64,
            initial_table_capacity: 1024,
            table_growth_factor: 2,
            table_shrink_factor: 2,
            initial_handle_capacity: 1,
            handle_growth_factor: 2,
            btree_order: 320,
            radix_bits_small: 4,
            radix_bits_medium: 5,
            radix_bits_large: 8,
            hash_join_naive_cutoff: 100_000,
            task_queue_depth: 1024,
            load_batch_rows: 1024,
            quicksort_insertion_cutoff: 15,
            scan_chunk_target_bytes: 64 * 1024,
        }
    }
}

impl Config {
    /// Radix bit width for a join over inputs of the given max size, per
    /// the thresholds in §6.
    pub fn radix_bits_for(&self, max_input_len: usize) -> u32 {
        if max_input_len < 500_000 {
            self.radix_bits_small
        } else if max_input_len < 2_000_000 {
            self.radix_bits_medium
        } else {
            self.radix_bits_large
        }
    }

    /// Default worker count: `nproc - 1 - weighted(load)`, floored at
    /// `max(1, nproc / 4)`.
    pub fn default_worker_count(&self) -> usize {
        let nproc = num_cpus::get().max(1);
        let floor = (nproc / 4).max(1);
        let weighted_load = 0usize; // no ambient load signal available at startup
        nproc.saturating_sub(1 + weighted_load).max(floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.initial_table_capacity, 1024);
        assert_eq!(cfg.btree_order, 320);
        assert_eq!(cfg.task_queue_depth, 1024);
    }

    #[test]
    fn radix_bits_thresholds() {
        let cfg = Config::default();
        assert_eq!(cfg.radix_bits_for(100), 4);
        assert_eq!(cfg.radix_bits_for(499_999), 4);
        assert_eq!(cfg.radix_bits_for(500_000), 5);
        assert_eq!(cfg.radix_bits_for(1_999_999), 5);
        assert_eq!(cfg.radix_bits_for(2_000_000), 8);
    }

    #[test]
    fn worker_count_has_a_floor() {
        let cfg = Config::default();
        assert!(cfg.default_worker_count() >= 1);
    }
}
