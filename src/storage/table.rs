//! Table lifecycle: column set, row capacity, expand/shrink (§4.E, §3).

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::index::IndexType;
use crate::storage::column::Column;

/// A table: a fixed set of same-length columns plus row-count bookkeeping.
pub struct Table {
    pub name: String,
    /// Declared column count (from `create table`).
    pub n_cols: usize,
    /// One entry per initialized column, in creation order.
    pub columns: Vec<Column>,
    pub n_rows: usize,
    pub capacity: usize,
    /// Index of the unique clustered column, if any.
    pub primary: Option<usize>,
    dir: PathBuf,
}

impl Table {
    pub fn new(dir: &Path, name: &str, n_cols: usize) -> Self {
        Self {
            name: name.to_string(),
            n_cols,
            columns: Vec::new(),
            n_rows: 0,
            capacity: 0,
            primary: None,
            dir: dir.to_path_buf(),
        }
    }

    /// A table is ready for data operators once every declared column has
    /// been initialized.
    pub fn is_ready(&self) -> bool {
        self.columns.len() == self.n_cols
    }

    pub fn n_inited_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn check_ready(&self) -> CoreResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CoreError::TableNotReady {
                table: self.name.clone(),
                initialized: self.columns.len(),
                declared: self.n_cols,
            })
        }
    }

    /// Add the next declared column, creating its backing file. The first
    /// column in a fresh table sets the table's initial capacity.
    pub fn add_column(&mut self, name: &str, cfg: &Config) -> CoreResult<()> {
        if self.columns.len() >= self.n_cols {
            return Err(CoreError::ColumnAlreadyExists(name.to_string(), self.name.clone()));
        }
        if self.column_index(name).is_some() {
            return Err(CoreError::ColumnAlreadyExists(name.to_string(), self.name.clone()));
        }
        if self.columns.is_empty() {
            self.capacity = cfg.initial_table_capacity;
        }
        let col = Column::create(&self.dir, &self.name, name, self.capacity)?;
        self.columns.push(col);
        Ok(())
    }

    /// Restore a column already on disk, used on launch.
    pub fn reopen_column(&mut self, name: &str) -> CoreResult<()> {
        let col = Column::open_existing(&self.dir, &self.name, name, self.capacity)?;
        self.columns.push(col);
        Ok(())
    }

    /// Ensure at least `delta` additional rows fit, doubling capacity as
    /// needed and remapping every column (§4.E Expand).
    pub fn expand(&mut self, delta: usize, cfg: &Config) -> CoreResult<()> {
        self.check_ready()?;
        if self.n_rows + delta <= self.capacity {
            return Ok(());
        }
        let mut new_cap = self.capacity.max(1);
        while self.n_rows + delta > new_cap {
            new_cap *= cfg.table_growth_factor;
        }
        self.resize_all_columns(new_cap)?;
        self.capacity = new_cap;
        Ok(())
    }

    /// Halve capacity while `n_rows * shrink_factor * 2 < capacity`, never
    /// below the table's initial capacity. Not invoked on table creation.
    pub fn shrink(&mut self, cfg: &Config) -> CoreResult<()> {
        self.check_ready()?;
        let floor = cfg.initial_table_capacity.max(1);
        let mut new_cap = self.capacity;
        while self.n_rows * cfg.table_shrink_factor * 2 < new_cap && new_cap / cfg.table_shrink_factor >= floor {
            new_cap /= cfg.table_shrink_factor;
        }
        if new_cap == self.capacity {
            return Ok(());
        }
        self.resize_all_columns(new_cap)?;
        self.capacity = new_cap;
        Ok(())
    }

    /// Resize every column to `new_cap`. Pre-flights each column's backing
    /// file length before remapping any of them, so a failure partway
    /// through (e.g. disk full on the third of five columns) is caught
    /// before any live mapping changes, rather than leaving some columns
    /// resized and others not (§4.E).
    fn resize_all_columns(&mut self, new_cap: usize) -> CoreResult<()> {
        for col in &self.columns {
            col.reserve_capacity(new_cap)
                .map_err(|_| CoreError::ResizeFailed(self.name.clone(), col.name.clone()))?;
        }
        for col in &mut self.columns {
            col.remap(new_cap)
                .map_err(|_| CoreError::ResizeFailed(self.name.clone(), col.name.clone()))?;
        }
        Ok(())
    }

    /// Truncate every column to `capacity`, flush, and drop its mapping.
    pub fn shutdown(&mut self) -> CoreResult<()> {
        for col in &mut self.columns {
            col.shutdown()?;
        }
        Ok(())
    }

    /// Delete every initialized column's backing file. Used when a
    /// database is replaced (§3).
    pub fn delete_files(&self) -> CoreResult<()> {
        for col in &self.columns {
            let _ = std::fs::remove_file(col.path());
        }
        Ok(())
    }

    pub fn clustered_index_type(&self) -> Option<IndexType> {
        self.primary.map(|i| self.columns[i].index_type)
    }
}
