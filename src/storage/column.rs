//! Memory-mapped column files (§4.E).
//!
//! A column is a fixed-width `i32` array backed by a file of exactly
//! `capacity * 4` bytes, mapped shared read/write. Resizing truncates the
//! file then remaps, since `memmap2` requires an unmap before a file can
//! grow or shrink under it.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::error::{CoreError, CoreResult};
use crate::index::IndexType;

/// One memory-mapped `i32` column.
pub struct Column {
    pub name: String,
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    pub capacity: usize,
    pub index_type: IndexType,
    /// Argsort permutation; present for unclustered index variants.
    pub sorter: Option<Vec<usize>>,
    /// Keyed `(value, row_index)` B+ tree; present for the two btree
    /// index variants.
    pub tree: Option<crate::btree::BPlusTree>,
}

fn file_len_for_capacity(capacity: usize) -> u64 {
    (capacity as u64) * (std::mem::size_of::<i32>() as u64)
}

impl Column {
    /// Create (or truncate-open) a column file of `capacity` rows at
    /// `dir/<table>.<column>` and map it.
    pub fn create(dir: &Path, table: &str, name: &str, capacity: usize) -> CoreResult<Self> {
        let path = dir.join(format!("{table}.{name}"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(file_len_for_capacity(capacity))?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            name: name.to_string(),
            path,
            file,
            mmap,
            capacity,
            index_type: IndexType::None,
            sorter: None,
            tree: None,
        })
    }

    /// Open an existing column file and map it without altering its
    /// length, used on launch.
    pub fn open_existing(dir: &Path, table: &str, name: &str, capacity: usize) -> CoreResult<Self> {
        let path = dir.join(format!("{table}.{name}"));
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let expected = file_len_for_capacity(capacity);
        if file.metadata()?.len() != expected {
            file.set_len(expected)?;
        }
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            name: name.to_string(),
            path,
            file,
            mmap,
            capacity,
            index_type: IndexType::None,
            sorter: None,
            tree: None,
        })
    }

    /// Borrow the live `[0, capacity)` window as `i32`s.
    pub fn data(&self) -> &[i32] {
        let bytes = &self.mmap[..];
        debug_assert_eq!(bytes.len(), self.capacity * 4);
        unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<i32>(), self.capacity) }
    }

    /// Mutably borrow the live `[0, capacity)` window as `i32`s.
    pub fn data_mut(&mut self) -> &mut [i32] {
        let bytes = &mut self.mmap[..];
        unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr().cast::<i32>(), self.capacity) }
    }

    /// Pre-flight for [`remap`]: grow or shrink the backing file's length
    /// to `new_capacity` without touching the live mapping. Lets a caller
    /// confirm every column in a table CAN be resized before any of them
    /// actually are, so a failure partway through a multi-column resize
    /// never leaves one column remapped and another not.
    pub fn reserve_capacity(&self, new_capacity: usize) -> CoreResult<()> {
        self.file
            .set_len(file_len_for_capacity(new_capacity))
            .map_err(|e| CoreError::ResizeFailed(self.name.clone(), e.to_string()))
    }

    /// Remap to `new_capacity`: truncate the backing file then remap, per
    /// §4.E (resizing truncates, then remaps, letting the kernel move the
    /// mapping).
    pub fn remap(&mut self, new_capacity: usize) -> CoreResult<()> {
        // drop the old mapping before touching file length; Unix requires
        // the mapping be gone before the backing file shrinks or grows
        self.mmap = MmapMut::map_anon(1).map_err(|e| CoreError::ResizeFailed(self.name.clone(), e.to_string()))?;
        self.file
            .set_len(file_len_for_capacity(new_capacity))
            .map_err(|e| CoreError::ResizeFailed(self.name.clone(), e.to_string()))?;
        self.mmap = unsafe {
            MmapMut::map_mut(&self.file).map_err(|e| CoreError::ResizeFailed(self.name.clone(), e.to_string()))?
        };
        self.capacity = new_capacity;
        if let Some(sorter) = &mut self.sorter {
            sorter.reserve(new_capacity.saturating_sub(sorter.len()));
        }
        Ok(())
    }

    /// Truncate to `capacity`, flush to disk, and drop the mapping. Called
    /// during shutdown; the `File` itself is closed when `self` drops.
    pub fn shutdown(&mut self) -> CoreResult<()> {
        self.mmap.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
