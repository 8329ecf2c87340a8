//! Binary catalog read/write (§6).
//!
//! The catalog is a packed, native-endian serialization of schema only —
//! no column data, which lives in the per-column mmap files. `size_t`
//! fields are written as fixed 8-byte `u64` for portability across hosts
//! of different pointer width; see DESIGN.md for this and the other
//! Open Question resolutions.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use crate::error::CoreResult;
use crate::index::IndexType;

const NAME_LEN: usize = 64;
/// Sentinel for "no clustered index", matching the source's `SIZE_MAX`.
pub const NO_PRIMARY: u64 = u64::MAX;

fn write_name(out: &mut Vec<u8>, name: &str) {
    let mut buf = [0u8; NAME_LEN];
    let bytes = name.as_bytes();
    let n = bytes.len().min(NAME_LEN);
    buf[..n].copy_from_slice(&bytes[..n]);
    out.extend_from_slice(&buf);
}

fn read_name(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

fn index_type_tag(it: IndexType) -> u32 {
    match it {
        IndexType::None => 0,
        IndexType::UnclusteredSorted => 1,
        IndexType::UnclusteredBtree => 2,
        IndexType::ClusteredSorted => 3,
        IndexType::ClusteredBtree => 4,
    }
}

fn index_type_from_tag(tag: u32) -> IndexType {
    match tag {
        1 => IndexType::UnclusteredSorted,
        2 => IndexType::UnclusteredBtree,
        3 => IndexType::ClusteredSorted,
        4 => IndexType::ClusteredBtree,
        _ => IndexType::None,
    }
}

/// One column's persisted header: name plus the index it should be
/// rebuilt into on launch.
#[derive(Debug, Clone)]
pub struct ColumnHeader {
    pub name: String,
    pub index_type: IndexType,
}

/// One table's persisted header.
#[derive(Debug, Clone)]
pub struct TableHeader {
    pub name: String,
    pub n_cols: usize,
    pub n_rows: usize,
    pub capacity: usize,
    pub primary: Option<usize>,
    pub columns: Vec<ColumnHeader>,
}

/// The whole persisted schema (no column data).
#[derive(Debug, Clone)]
pub struct CatalogHeader {
    pub database_name: String,
    pub tables: Vec<TableHeader>,
}

/// Serialize `header` to `path` (the `__catalog__` file), overwriting it.
pub fn write_catalog(path: &Path, header: &CatalogHeader) -> CoreResult<()> {
    let mut buf = Vec::new();
    write_name(&mut buf, &header.database_name);
    buf.extend_from_slice(&(header.tables.len() as u64).to_ne_bytes());
    buf.extend_from_slice(&(header.tables.len() as u64).to_ne_bytes()); // "capacity" of the table array
    for t in &header.tables {
        write_name(&mut buf, &t.name);
        buf.extend_from_slice(&(t.n_cols as u64).to_ne_bytes());
        buf.extend_from_slice(&(t.columns.len() as u64).to_ne_bytes());
        buf.extend_from_slice(&(t.n_rows as u64).to_ne_bytes());
        buf.extend_from_slice(&(t.capacity as u64).to_ne_bytes());
        let primary = t.primary.map(|p| p as u64).unwrap_or(NO_PRIMARY);
        buf.extend_from_slice(&primary.to_ne_bytes());
        for c in &t.columns {
            write_name(&mut buf, &c.name);
            buf.extend_from_slice(&index_type_tag(c.index_type).to_ne_bytes());
        }
    }
    let mut file = File::create(path)?;
    file.write_all(&buf)?;
    file.sync_all()?;
    Ok(())
}

/// Read `path`. Returns `Ok(None)` if the file is absent or empty, per
/// §4.E Launch ("if absent or empty, start with no database").
pub fn read_catalog(path: &Path) -> CoreResult<Option<CatalogHeader>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    if buf.is_empty() {
        return Ok(None);
    }
    let mut cursor = 0usize;
    let mut take = |n: usize| -> &[u8] {
        let s = &buf[cursor..cursor + n];
        cursor += n;
        s
    };
    let database_name = read_name(take(NAME_LEN));
    let n_tables = u64::from_ne_bytes(take(8).try_into().unwrap()) as usize;
    let _capacity = u64::from_ne_bytes(take(8).try_into().unwrap());

    let mut tables = Vec::with_capacity(n_tables);
    for _ in 0..n_tables {
        let name = read_name(take(NAME_LEN));
        let n_cols = u64::from_ne_bytes(take(8).try_into().unwrap()) as usize;
        let n_inited = u64::from_ne_bytes(take(8).try_into().unwrap()) as usize;
        let n_rows = u64::from_ne_bytes(take(8).try_into().unwrap()) as usize;
        let capacity = u64::from_ne_bytes(take(8).try_into().unwrap()) as usize;
        let primary_raw = u64::from_ne_bytes(take(8).try_into().unwrap());
        let primary = if primary_raw == NO_PRIMARY { None } else { Some(primary_raw as usize) };
        let mut columns = Vec::with_capacity(n_inited);
        for _ in 0..n_inited {
            let cname = read_name(take(NAME_LEN));
            let tag = u32::from_ne_bytes(take(4).try_into().unwrap());
            columns.push(ColumnHeader {
                name: cname,
                index_type: index_type_from_tag(tag),
            });
        }
        tables.push(TableHeader {
            name,
            n_cols,
            n_rows,
            capacity,
            primary,
            columns,
        });
    }
    Ok(Some(CatalogHeader { database_name, tables }))
}

/// The on-disk name of the catalog file, kept here so both the writer and
/// the directory-clearing path agree on it.
pub const CATALOG_FILE_NAME: &str = "__catalog__";

/// Remove every `<table>.<column>` file under `dir`, used when a database
/// is replaced (§3). The catalog itself is left alone — it is overwritten
/// at shutdown, not deleted up front.
pub fn delete_persisted_files(dir: &Path) -> CoreResult<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && entry.file_name() != CATALOG_FILE_NAME {
            let _ = fs::remove_file(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_catalog_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("__catalog__");
        assert!(read_catalog(&path).unwrap().is_none());
    }

    #[test]
    fn round_trip_preserves_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("__catalog__");
        let header = CatalogHeader {
            database_name: "mydb".to_string(),
            tables: vec![TableHeader {
                name: "orders".to_string(),
                n_cols: 2,
                n_rows: 5,
                capacity: 1024,
                primary: Some(0),
                columns: vec![
                    ColumnHeader {
                        name: "id".to_string(),
                        index_type: IndexType::ClusteredSorted,
                    },
                    ColumnHeader {
                        name: "qty".to_string(),
                        index_type: IndexType::None,
                    },
                ],
            }],
        };
        write_catalog(&path, &header).unwrap();
        let back = read_catalog(&path).unwrap().unwrap();
        assert_eq!(back.database_name, "mydb");
        assert_eq!(back.tables.len(), 1);
        assert_eq!(back.tables[0].n_rows, 5);
        assert_eq!(back.tables[0].primary, Some(0));
        assert_eq!(back.tables[0].columns[0].index_type, IndexType::ClusteredSorted);
        assert_eq!(back.tables[0].columns[1].name, "qty");
    }

    #[test]
    fn names_longer_than_64_bytes_truncate() {
        let mut buf = Vec::new();
        let long = "x".repeat(100);
        write_name(&mut buf, &long);
        assert_eq!(buf.len(), NAME_LEN);
        assert_eq!(read_name(&buf), "x".repeat(NAME_LEN));
    }
}
