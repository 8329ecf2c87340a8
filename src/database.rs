//! Catalog/session lifecycle (§4.L) and the top-level `Database` (§3).
//!
//! `Database` owns the table set and the persistence directory. Every
//! operator (§4.K) is handed a `&mut Database` rather than reaching for a
//! process-global, per the reimplementation note in §9 ("Singleton
//! database").

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::index::{self, IndexType};
use crate::pool::WorkerPool;
use crate::storage::catalog::{self, CatalogHeader, ColumnHeader, TableHeader};
use crate::storage::table::Table;

/// Read-only per-column statistics surfaced by [`Database::describe_table`].
#[derive(Debug, Clone)]
pub struct ColumnStats {
    pub name: String,
    pub index_type: IndexType,
}

/// Read-only per-table statistics (§E.2 of the expanded design).
#[derive(Debug, Clone)]
pub struct TableStats {
    pub name: String,
    pub n_rows: usize,
    pub capacity: usize,
    pub columns: Vec<ColumnStats>,
    pub primary: Option<usize>,
}

/// The process-singleton-in-spirit database: a name, a table set, and the
/// persistence directory backing it.
pub struct Database {
    pub name: String,
    dir: PathBuf,
    pub tables: Vec<Table>,
    pub cfg: Config,
    pool: Option<WorkerPool>,
}

impl Database {
    /// Launch (§4.L): read the catalog at `dir`; if absent or empty start
    /// with no database (an empty, unnamed shell). Otherwise reconstruct
    /// the schema, remap every column file, and rebuild each column's
    /// index with `skip_sort = true`.
    pub fn launch(dir: impl AsRef<Path>, cfg: Option<Config>) -> CoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&dir)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&dir, perms)?;
        }
        let cfg = cfg.unwrap_or_default();
        let catalog_path = dir.join(catalog::CATALOG_FILE_NAME);
        let header = catalog::read_catalog(&catalog_path)?;

        let mut db = Self {
            name: String::new(),
            dir,
            tables: Vec::new(),
            cfg,
            pool: None,
        };

        let Some(header) = header else {
            debug!("no catalog found; starting with no database");
            return Ok(db);
        };

        db.name = header.database_name;
        for th in header.tables {
            let mut table = Table::new(&db.dir, &th.name, th.n_cols);
            table.n_rows = th.n_rows;
            table.capacity = th.capacity;
            for ch in &th.columns {
                table.reopen_column(&ch.name)?;
            }
            for (i, ch) in th.columns.iter().enumerate() {
                if ch.index_type != IndexType::None {
                    index::init_index(&mut table, i, ch.index_type, true, &db.cfg)?;
                }
            }
            table.primary = th.primary;
            debug!(table = %table.name, n_rows = table.n_rows, "restored table");
            db.tables.push(table);
        }
        Ok(db)
    }

    /// Enable the worker pool used by the parallel scan and radix-join
    /// paths, sized per §6's default formula.
    pub fn enable_parallelism(&mut self) {
        if self.pool.is_none() {
            self.pool = Some(WorkerPool::with_default_size(&self.cfg));
        }
    }

    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_ref()
    }

    fn catalog_path(&self) -> PathBuf {
        self.dir.join(catalog::CATALOG_FILE_NAME)
    }

    fn to_catalog_header(&self) -> CatalogHeader {
        CatalogHeader {
            database_name: self.name.clone(),
            tables: self
                .tables
                .iter()
                .map(|t| TableHeader {
                    name: t.name.clone(),
                    n_cols: t.n_cols,
                    n_rows: t.n_rows,
                    capacity: t.capacity,
                    primary: t.primary,
                    columns: t
                        .columns
                        .iter()
                        .map(|c| ColumnHeader {
                            name: c.name.clone(),
                            index_type: c.index_type,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Shutdown (§4.L): persist the schema, then flush and drop every
    /// column's mapping. Column data already lives in its mmap'd file and
    /// is synced on flush; the catalog carries no column data.
    pub fn close(&mut self) -> CoreResult<()> {
        for t in &mut self.tables {
            t.shutdown()?;
        }
        catalog::write_catalog(&self.catalog_path(), &self.to_catalog_header())?;
        if let Some(pool) = &mut self.pool {
            pool.shutdown()?;
        }
        Ok(())
    }

    /// Shutdown and remove every persisted file, used by tests and by
    /// "replacing a database" (§3).
    pub fn close_and_delete(&mut self) -> CoreResult<()> {
        for t in &mut self.tables {
            t.shutdown()?;
        }
        catalog::delete_persisted_files(&self.dir)?;
        if let Some(pool) = &mut self.pool {
            pool.shutdown()?;
        }
        Ok(())
    }

    pub fn table_index(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name == name)
    }

    pub fn table(&self, name: &str) -> CoreResult<&Table> {
        self.table_index(name).map(|i| &self.tables[i]).ok_or_else(|| CoreError::TableNotFound(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> CoreResult<&mut Table> {
        let idx = self.table_index(name).ok_or_else(|| CoreError::TableNotFound(name.to_string()))?;
        Ok(&mut self.tables[idx])
    }

    /// Create (database): deletes any prior persistence directory
    /// contents if a database was already open, then adopts `name`.
    pub fn create_database(&mut self, name: &str) -> CoreResult<()> {
        if !self.name.is_empty() {
            catalog::delete_persisted_files(&self.dir)?;
            self.tables.clear();
        }
        self.name = name.to_string();
        debug!(database = %name, "created database");
        Ok(())
    }

    /// Create (table): pure schema mutation, name-unique.
    pub fn create_table(&mut self, name: &str, n_cols: usize) -> CoreResult<()> {
        if self.table_index(name).is_some() {
            return Err(CoreError::TableAlreadyExists(name.to_string()));
        }
        self.tables.push(Table::new(&self.dir, name, n_cols));
        debug!(table = %name, n_cols, "created table");
        Ok(())
    }

    /// Create (column): appends the next declared column.
    pub fn create_column(&mut self, table: &str, name: &str) -> CoreResult<()> {
        let t = self.table_mut(table)?;
        t.add_column(name, &self.cfg)
    }

    /// Create (index): initializes `column`'s index. Creating the first
    /// clustered index on a table reorders all data and rebuilds every
    /// other index (§4.F).
    pub fn create_index(&mut self, table: &str, column: &str, index_type: IndexType) -> CoreResult<()> {
        let cfg = self.cfg;
        let t = self.table_mut(table)?;
        let col_idx = t.column_index(column).ok_or_else(|| CoreError::ColumnNotFound(column.to_string(), table.to_string()))?;
        index::init_index(t, col_idx, index_type, false, &cfg)
    }

    /// Insert (§4.K): with a clustered index, find the insertion slot and
    /// shift; without one, append and update unclustered indexes
    /// incrementally.
    pub fn insert_row(&mut self, table: &str, values: &[i32]) -> CoreResult<()> {
        let cfg = self.cfg;
        let t = self.table_mut(table)?;
        if !t.is_ready() {
            return Err(CoreError::TableNotReady {
                table: t.name.clone(),
                initialized: t.columns.len(),
                declared: t.n_cols,
            });
        }
        if values.len() != t.columns.len() {
            return Err(CoreError::ShapeMismatch(format!(
                "insert into '{}' expected {} values, got {}",
                table,
                t.columns.len(),
                values.len()
            )));
        }
        t.expand(1, &cfg)?;

        if let Some(primary) = t.primary {
            let it = t.columns[primary].index_type;
            let slot = {
                let primary_data = t.columns[primary].data();
                match it {
                    IndexType::ClusteredSorted => crate::search::binsearch(&primary_data[..t.n_rows], i64::from(values[primary]), crate::search::Align::Right),
                    IndexType::ClusteredBtree => t.columns[primary].tree.as_ref().unwrap().rank(i64::from(values[primary]), crate::search::Align::Right),
                    _ => unreachable!("primary column must carry a clustered index"),
                }
            };
            for (ci, col) in t.columns.iter_mut().enumerate() {
                let n = t.n_rows;
                col.data_mut().copy_within(slot..n, slot + 1);
                col.data_mut()[slot] = values[ci];
            }
            t.n_rows += 1;
            // data is already physically in sorted order; skip_sort avoids a
            // redundant full argsort/reorder pass
            index::free_index(t, primary);
            index::init_index(t, primary, it, true, &cfg)?;
            index::rebuild_unclustered_indexes(t, Some(primary), &cfg)?;
        } else {
            let row = t.n_rows;
            for (ci, col) in t.columns.iter_mut().enumerate() {
                col.data_mut()[row] = values[ci];
            }
            t.n_rows += 1;
            for ci in 0..t.columns.len() {
                let it = t.columns[ci].index_type;
                if it.has_sorter() {
                    index::update_sorter_append(t, ci, row, &cfg)?;
                    index::insert_into_tree(t, ci, row);
                }
            }
        }
        Ok(())
    }

    /// Load, phase 1: validate the CSV column list matches this table's
    /// columns in creation order.
    pub fn load_validate_header(&self, table: &str, header_cols: &[String]) -> CoreResult<()> {
        let t = self.table(table)?;
        let expected: Vec<String> = t.columns.iter().map(|c| c.name.clone()).collect();
        if expected != header_cols {
            return Err(CoreError::HeaderMismatch {
                table: table.to_string(),
                expected,
                actual: header_cols.to_vec(),
            });
        }
        Ok(())
    }

    /// Load, phase 2: append a row-major batch (already narrowed to
    /// `i32`, per §9's CSV-parsing open question) column-major into the
    /// mmap'd prefix.
    pub fn load_append_rows(&mut self, table: &str, rows: &[Vec<i32>]) -> CoreResult<()> {
        let cfg = self.cfg;
        let t = self.table_mut(table)?;
        if rows.is_empty() {
            return Ok(());
        }
        t.expand(rows.len(), &cfg)?;
        let start = t.n_rows;
        for (ci, col) in t.columns.iter_mut().enumerate() {
            let dst = col.data_mut();
            for (ri, row) in rows.iter().enumerate() {
                dst[start + ri] = row[ci];
            }
        }
        t.n_rows += rows.len();
        Ok(())
    }

    /// Load, phase 3: rebuild/merge every index once, via
    /// [`index::conclude_unclustered_append`] for unclustered indexes or a
    /// full clustered reinitialize for a clustered one.
    pub fn load_conclude(&mut self, table: &str, rows_before: usize) -> CoreResult<()> {
        let cfg = self.cfg;
        let t = self.table_mut(table)?;
        if let Some(primary) = t.primary {
            let it = t.columns[primary].index_type;
            index::free_index(t, primary);
            index::init_index(t, primary, it, false, &cfg)?;
        } else {
            for ci in 0..t.columns.len() {
                if t.columns[ci].index_type.has_sorter() {
                    index::conclude_unclustered_append(t, ci, rows_before, &cfg)?;
                }
            }
        }
        Ok(())
    }

    /// Delete (§4.K): remove `positions` from every column, repairing
    /// indexes, then apply the shrink policy.
    pub fn delete_rows(&mut self, table: &str, positions: &[usize]) -> CoreResult<()> {
        let cfg = self.cfg;
        let t = self.table_mut(table)?;
        let n = t.n_rows;
        let mut removed = crate::bitvec::BitVec::new(n);
        for &p in positions {
            if p < n {
                removed.set(p);
            }
        }
        let k = removed.count_ones();
        if k == 0 {
            return Ok(());
        }

        // old row id -> new row id, None for rows being removed; shared by
        // every column's data compaction below and by the unclustered
        // sorter repair, since all columns compact in lockstep
        let mut old_to_new = vec![None; n];
        let mut write = 0usize;
        for read in 0..n {
            if !removed.get(read) {
                old_to_new[read] = Some(write);
                write += 1;
            }
        }

        for col in &mut t.columns {
            let data = col.data_mut();
            let mut write = 0usize;
            for read in 0..n {
                if !removed.get(read) {
                    if write != read {
                        data[write] = data[read];
                    }
                    write += 1;
                }
            }
        }
        t.n_rows -= k;
        let was_primary = t.primary;
        if let Some(primary) = was_primary {
            let it = t.columns[primary].index_type;
            index::free_index(t, primary);
            index::init_index(t, primary, it, false, &cfg)?;
        } else {
            index::repair_unclustered_after_delete(t, &old_to_new, &cfg);
        }
        t.shrink(&cfg)?;
        Ok(())
    }

    /// Update (§4.K): write `values[i]` at `rows[i]` then drop and
    /// reinitialize that column's index.
    pub fn update_column(&mut self, table: &str, column: &str, rows: &[usize], values: &[i32]) -> CoreResult<()> {
        if rows.len() != values.len() {
            return Err(CoreError::ShapeMismatch("update rows/values length mismatch".to_string()));
        }
        let cfg = self.cfg;
        let t = self.table_mut(table)?;
        let col_idx = t.column_index(column).ok_or_else(|| CoreError::ColumnNotFound(column.to_string(), table.to_string()))?;
        {
            let data = t.columns[col_idx].data_mut();
            for (&row, &v) in rows.iter().zip(values) {
                data[row] = v;
            }
        }
        let it = t.columns[col_idx].index_type;
        if it != IndexType::None {
            index::free_index(t, col_idx);
            // a clustered reinit already rebuilds every sibling index; a
            // plain unclustered one only ever touches this column
            index::init_index(t, col_idx, it, false, &cfg)?;
        }
        Ok(())
    }

    /// Per-table introspection (§E.2): row/column/index statistics
    /// without a SQL surface.
    pub fn describe_table(&self, table: &str) -> CoreResult<TableStats> {
        let t = self.table(table)?;
        Ok(TableStats {
            name: t.name.clone(),
            n_rows: t.n_rows,
            capacity: t.capacity,
            primary: t.primary,
            columns: t
                .columns
                .iter()
                .map(|c| ColumnStats {
                    name: c.name.clone(),
                    index_type: c.index_type,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_table_insert_select_round_trip() {
        let dir = tempdir().unwrap();
        let mut db = Database::launch(dir.path(), None).unwrap();
        db.create_database("d").unwrap();
        db.create_table("t", 2).unwrap();
        db.create_column("t", "a").unwrap();
        db.create_column("t", "b").unwrap();
        db.insert_row("t", &[1, 10]).unwrap();
        db.insert_row("t", &[2, 20]).unwrap();
        db.insert_row("t", &[3, 30]).unwrap();
        let t = db.table("t").unwrap();
        assert_eq!(t.n_rows, 3);
        assert_eq!(&t.columns[0].data()[..3], &[1, 2, 3]);
        assert_eq!(&t.columns[1].data()[..3], &[10, 20, 30]);
    }

    #[test]
    fn scenario_load_then_select() {
        let dir = tempdir().unwrap();
        let mut db = Database::launch(dir.path(), None).unwrap();
        db.create_database("d").unwrap();
        db.create_table("T", 2).unwrap();
        db.create_column("T", "a").unwrap();
        db.create_column("T", "b").unwrap();
        db.load_validate_header("T", &["a".to_string(), "b".to_string()]).unwrap();
        let before = db.table("T").unwrap().n_rows;
        db.load_append_rows("T", &[vec![1, 10], vec![2, 20], vec![3, 30]]).unwrap();
        db.load_conclude("T", before).unwrap();
        let t = db.table("T").unwrap();
        let matches: Vec<usize> = (0..t.n_rows).filter(|&i| t.columns[0].data()[i] >= 2 && t.columns[0].data()[i] < 4).collect();
        assert_eq!(matches, vec![1, 2]);
        let fetched: Vec<i32> = matches.iter().map(|&i| t.columns[1].data()[i]).collect();
        assert_eq!(fetched, vec![20, 30]);
    }

    #[test]
    fn scenario_delete_repairs_unclustered_sorter() {
        let dir = tempdir().unwrap();
        let mut db = Database::launch(dir.path(), None).unwrap();
        db.create_database("d").unwrap();
        db.create_table("t", 1).unwrap();
        db.create_column("t", "a").unwrap();
        for v in [5, 1, 4, 2, 3] {
            db.insert_row("t", &[v]).unwrap();
        }
        db.create_index("t", "a", IndexType::UnclusteredSorted).unwrap();
        db.delete_rows("t", &[0, 2]).unwrap();
        let t = db.table("t").unwrap();
        assert_eq!(&t.columns[0].data()[..t.n_rows], &[1, 2, 3]);
        let sorter = t.columns[0].sorter.clone().unwrap();
        assert_eq!(sorter, vec![0, 1, 2]);
    }

    #[test]
    fn unclustered_btree_insert_is_incremental_and_queryable() {
        let dir = tempdir().unwrap();
        let mut db = Database::launch(dir.path(), None).unwrap();
        db.create_database("d").unwrap();
        db.create_table("t", 1).unwrap();
        db.create_column("t", "a").unwrap();
        db.create_index("t", "a", IndexType::UnclusteredBtree).unwrap();
        for v in [5, 1, 4, 2, 3] {
            db.insert_row("t", &[v]).unwrap();
        }
        let t = db.table("t").unwrap();
        let tree = t.columns[0].tree.as_ref().unwrap();
        assert_eq!(tree.len(), 5);
        for (row, &v) in [5, 1, 4, 2, 3].iter().enumerate() {
            assert_eq!(tree.get(i64::from(v)), Some(row));
        }
    }

    #[test]
    fn unclustered_btree_load_conclude_rebuilds_tree() {
        let dir = tempdir().unwrap();
        let mut db = Database::launch(dir.path(), None).unwrap();
        db.create_database("d").unwrap();
        db.create_table("t", 1).unwrap();
        db.create_column("t", "a").unwrap();
        db.create_index("t", "a", IndexType::UnclusteredBtree).unwrap();
        let before = db.table("t").unwrap().n_rows;
        db.load_append_rows("t", &[vec![5], vec![1], vec![4], vec![2], vec![3]]).unwrap();
        db.load_conclude("t", before).unwrap();
        let t = db.table("t").unwrap();
        let tree = t.columns[0].tree.as_ref().unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.get(4), Some(2));
        assert_eq!(tree.get(99), None);
    }

    #[test]
    fn delete_repairs_unclustered_btree_sorter_and_tree() {
        let dir = tempdir().unwrap();
        let mut db = Database::launch(dir.path(), None).unwrap();
        db.create_database("d").unwrap();
        db.create_table("t", 1).unwrap();
        db.create_column("t", "a").unwrap();
        db.create_index("t", "a", IndexType::UnclusteredBtree).unwrap();
        for v in [5, 1, 4, 2, 3] {
            db.insert_row("t", &[v]).unwrap();
        }
        // remove the rows holding 5 and 4
        db.delete_rows("t", &[0, 2]).unwrap();
        let t = db.table("t").unwrap();
        assert_eq!(&t.columns[0].data()[..t.n_rows], &[1, 2, 3]);
        let tree = t.columns[0].tree.as_ref().unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(4), None);
        assert_eq!(tree.get(5), None);
        assert_eq!(tree.get(1), Some(0));
        assert_eq!(tree.get(2), Some(1));
        assert_eq!(tree.get(3), Some(2));
    }

    #[test]
    fn clustered_insert_keeps_primary_sorted() {
        let dir = tempdir().unwrap();
        let mut db = Database::launch(dir.path(), None).unwrap();
        db.create_database("d").unwrap();
        db.create_table("t", 1).unwrap();
        db.create_column("t", "a").unwrap();
        for v in [5, 3, 1] {
            db.insert_row("t", &[v]).unwrap();
        }
        db.create_index("t", "a", IndexType::ClusteredSorted).unwrap();
        db.insert_row("t", &[4]).unwrap();
        let t = db.table("t").unwrap();
        assert_eq!(&t.columns[0].data()[..t.n_rows], &[1, 3, 4, 5]);
    }

    #[test]
    fn replacing_database_keeps_catalog_until_shutdown() {
        let dir = tempdir().unwrap();
        let mut db = Database::launch(dir.path(), None).unwrap();
        db.create_database("d").unwrap();
        db.create_table("t", 1).unwrap();
        db.create_column("t", "a").unwrap();
        db.insert_row("t", &[1]).unwrap();
        db.close().unwrap();
        assert!(dir.path().join(catalog::CATALOG_FILE_NAME).exists());

        let mut db = Database::launch(dir.path(), None).unwrap();
        assert_eq!(db.name, "d");
        // replacing the open database wipes table data files but must not
        // touch the catalog file itself
        db.create_database("d2").unwrap();
        assert!(dir.path().join(catalog::CATALOG_FILE_NAME).exists());
        assert!(db.tables.is_empty());

        db.create_table("u", 1).unwrap();
        db.create_column("u", "b").unwrap();
        db.close().unwrap();

        let reopened = Database::launch(dir.path(), None).unwrap();
        assert_eq!(reopened.name, "d2");
        assert!(reopened.table("u").is_ok());
    }

    #[test]
    fn launch_restores_persisted_schema() {
        let dir = tempdir().unwrap();
        {
            let mut db = Database::launch(dir.path(), None).unwrap();
            db.create_database("d").unwrap();
            db.create_table("t", 1).unwrap();
            db.create_column("t", "a").unwrap();
            db.insert_row("t", &[7]).unwrap();
            db.create_index("t", "a", IndexType::ClusteredSorted).unwrap();
            db.close().unwrap();
        }
        let db = Database::launch(dir.path(), None).unwrap();
        assert_eq!(db.name, "d");
        let t = db.table("t").unwrap();
        assert_eq!(t.n_rows, 1);
        assert_eq!(t.columns[0].data()[0], 7);
        assert_eq!(t.columns[0].index_type, IndexType::ClusteredSorted);
    }
}
