//! `coldb-core`: an in-process column-store database.
//!
//! Fixed-width `i32` columns live in memory-mapped files under a
//! persistence directory; each column may carry at most one of five
//! index kinds, with at most one clustered index per table. A small
//! operator algebra (create/insert/load/delete/update/select/fetch/
//! aggregate/batch/add-sub/join/print) drives the engine through a
//! per-connection [`session::Session`] of name-keyed handles. Shared-scan
//! and radix-hash-join kernels fan out across a bounded [`pool::WorkerPool`]
//! when one is enabled; wire transport and request parsing are the
//! caller's concern, not this crate's.

pub mod bitvec;
pub mod btree;
pub mod config;
pub mod database;
pub mod error;
pub mod index;
pub mod join;
pub mod logging;
pub mod ops;
pub mod pool;
pub mod scan;
pub mod search;
pub mod session;
pub mod sort;
pub mod storage;

pub use config::Config;
pub use database::{ColumnStats, Database, TableStats};
pub use error::{CoreError, CoreResult};
pub use index::IndexType;
pub use ops::{AggKind, BatchContext};
pub use pool::WorkerPool;
pub use session::{NumericValue, Positions, Session, Value};
