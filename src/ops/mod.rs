//! Operator engine (§4.K).
//!
//! Twelve operator kinds, each a free function taking the pieces it needs
//! (`&mut Database`, `&mut Session`, and for the batchable ones `&mut
//! BatchContext`) rather than a struct with a `dispatch(record)` method —
//! the caller (the external transport) already knows which operator it's
//! invoking, so there is no protocol record to parse here (§6: "the core
//! receives pre-parsed operator records").
//!
//! Handle names are resolved against the session first; a name that
//! misses falls back to a catalog column lookup of the form
//! `table.column`, producing a transient `Value::Column` view. Per §9's
//! reimplementation note that an RAII `Result`/defer pattern is sufficient
//! in a memory-safe host language, that transient view is just a local
//! value dropped when the calling function returns — there is nothing
//! further to release.

pub mod batch;

use std::fmt::Write as _;

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::index::IndexType;
use crate::join;
use crate::scan::{self, AggFlags, ScanOutput, SelectSpec};
use crate::session::{NumericValue, Positions, Session, Value};

pub use batch::{AggKind, BatchContext};

fn resolve_value(session: &Session, db: &Database, name: &str) -> CoreResult<Value> {
    if let Some(v) = session.get_value(name) {
        return Ok(v.clone());
    }
    let (table, column) = name.split_once('.').ok_or_else(|| CoreError::MissingQualifier(name.to_string()))?;
    let t = db.table(table)?;
    let col = t.column_index(column).ok_or_else(|| CoreError::ColumnNotFound(column.to_string(), table.to_string()))?;
    Ok(Value::Column { table: table.to_string(), column: col })
}

fn resolve_positions(session: &Session, name: &str) -> CoreResult<Positions> {
    session.get_positions(name).cloned().ok_or_else(|| CoreError::HandleNotFound(name.to_string()))
}

fn resolve_optional_positions(session: &Session, name: Option<&str>) -> CoreResult<Option<Positions>> {
    name.map(|n| resolve_positions(session, n)).transpose()
}

/// Borrow the live `[0, n_rows)` data backing `value`.
fn resolve_data<'a>(db: &'a Database, value: &'a Value) -> CoreResult<&'a [i32]> {
    match value {
        Value::Column { table, column } => {
            let t = db.table(table)?;
            Ok(&t.columns[*column].data()[..t.n_rows])
        }
        Value::Owned(v) => Ok(v.as_slice()),
    }
}

fn ensure_not_batching(batch: &BatchContext) -> CoreResult<()> {
    if batch.is_active() {
        return Err(CoreError::BatchError("this operator is not permitted while a batch is open".to_string()));
    }
    Ok(())
}

fn scan_dispatch(db: &Database, data: &[i32], positions: Option<&[usize]>, selects: &[SelectSpec], agg: AggFlags) -> ScanOutput {
    match db.pool() {
        Some(pool) => scan::shared_scan_parallel(pool, data, positions, selects, agg, &db.cfg),
        None => scan::shared_scan(data, positions, selects, agg),
    }
}

// ---------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------

pub fn create_database(db: &mut Database, name: &str) -> CoreResult<()> {
    db.create_database(name)
}

pub fn create_table(db: &mut Database, name: &str, n_cols: usize) -> CoreResult<()> {
    db.create_table(name, n_cols)
}

pub fn create_column(db: &mut Database, table: &str, name: &str) -> CoreResult<()> {
    db.create_column(table, name)
}

pub fn create_index(db: &mut Database, table: &str, column: &str, index_type: IndexType) -> CoreResult<()> {
    db.create_index(table, column, index_type)
}

// ---------------------------------------------------------------------
// Insert
// ---------------------------------------------------------------------

pub fn insert(db: &mut Database, batch: &BatchContext, table: &str, values: &[i32]) -> CoreResult<()> {
    ensure_not_batching(batch)?;
    db.insert_row(table, values)
}

// ---------------------------------------------------------------------
// Load (three phases, §4.K / §6)
// ---------------------------------------------------------------------

/// Tracks the single in-flight load the session's three-phase protocol is
/// driving (header → row batches → conclude), the way [`BatchContext`]
/// tracks an in-flight batch.
#[derive(Default)]
pub struct LoadContext {
    table: Option<(String, usize)>,
}

impl LoadContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.table.is_some()
    }
}

pub fn load_header(db: &mut Database, batch: &BatchContext, load: &mut LoadContext, table: &str, header_cols: &[String]) -> CoreResult<()> {
    ensure_not_batching(batch)?;
    if load.is_active() {
        return Err(CoreError::BatchError(format!("a load for table '{table}' is already open")));
    }
    db.load_validate_header(table, header_cols)?;
    let rows_before = db.table(table)?.n_rows;
    load.table = Some((table.to_string(), rows_before));
    Ok(())
}

pub fn load_rows(db: &mut Database, load: &LoadContext, table: &str, rows: &[Vec<i32>]) -> CoreResult<()> {
    match &load.table {
        Some((t, _)) if t == table => db.load_append_rows(table, rows),
        _ => Err(CoreError::BatchError(format!("no open load for table '{table}'"))),
    }
}

pub fn load_conclude(db: &mut Database, load: &mut LoadContext, table: &str) -> CoreResult<()> {
    match load.table.take() {
        Some((t, rows_before)) if t == table => db.load_conclude(table, rows_before),
        Some(other) => {
            load.table = Some(other);
            Err(CoreError::BatchError(format!("no open load for table '{table}'")))
        }
        None => Err(CoreError::BatchError(format!("no open load for table '{table}'"))),
    }
}

// ---------------------------------------------------------------------
// Delete / Update
// ---------------------------------------------------------------------

pub fn delete(db: &mut Database, batch: &BatchContext, table: &str, positions: &[usize]) -> CoreResult<()> {
    ensure_not_batching(batch)?;
    db.delete_rows(table, positions)
}

pub fn update(db: &mut Database, batch: &BatchContext, table: &str, column: &str, rows: &[usize], values: &[i32]) -> CoreResult<()> {
    ensure_not_batching(batch)?;
    db.update_column(table, column, rows, values)
}

// ---------------------------------------------------------------------
// Select (§4.H / §4.K)
// ---------------------------------------------------------------------

/// Index-accelerated select used when `value` is a live, indexed column
/// and no position-vector restricts the domain (§4.H's specialization).
fn select_indexed(db: &Database, table: &str, column: usize, lo: i64, hi: i64, positions: Option<&[usize]>) -> CoreResult<Option<Vec<usize>>> {
    let t = db.table(table)?;
    let col = &t.columns[column];
    let out = match col.index_type {
        IndexType::None => return Ok(None),
        IndexType::UnclusteredSorted if positions.is_none() => {
            scan::select_unclustered_sorted(&col.data()[..t.n_rows], col.sorter.as_ref().expect("sorter present"), lo, hi)
        }
        IndexType::UnclusteredBtree => {
            scan::select_unclustered_btree(col.tree.as_ref().expect("tree present"), lo, hi, positions)
        }
        IndexType::ClusteredSorted if positions.is_none() => scan::select_clustered_sorted(&col.data()[..t.n_rows], lo, hi),
        IndexType::ClusteredBtree if positions.is_none() => scan::select_clustered_btree(col.tree.as_ref().expect("tree present"), lo, hi),
        _ => return Ok(None),
    };
    Ok(Some(out))
}

/// Immediate (non-batched) select: resolves `value`/`positions`, dispatches
/// to the index-accelerated path when applicable, otherwise a shared scan
/// with a single range, and stores the result under `out_name`.
pub fn select(
    db: &mut Database,
    session: &mut Session,
    batch: &mut BatchContext,
    value_name: &str,
    positions_name: Option<&str>,
    lo: Option<i64>,
    hi: Option<i64>,
    out_name: &str,
) -> CoreResult<()> {
    let value = resolve_value(session, db, value_name)?;
    let positions = resolve_optional_positions(session, positions_name)?;

    if batch.is_active() {
        batch.add_select(value, positions, lo, hi, out_name)?;
        return Ok(());
    }

    let resolved_lo = scan::resolve_lo(lo);
    let resolved_hi = scan::resolve_hi(hi);
    let pos_arr = positions.as_ref().map(|p| p.to_index_array());

    if let Value::Column { table, column } = &value {
        if let Some(out) = select_indexed(db, table, *column, resolved_lo, resolved_hi, pos_arr.as_deref())? {
            session.set_positions(out_name, Positions::IndexArray(out));
            return Ok(());
        }
    }

    let data = resolve_data(db, &value)?;
    let spec = SelectSpec { lo: resolved_lo, hi: resolved_hi };
    let out = scan_dispatch(db, data, pos_arr.as_deref(), std::slice::from_ref(&spec), AggFlags::default());
    session.set_positions(out_name, Positions::IndexArray(out.selects.into_iter().next().unwrap_or_default()));
    Ok(())
}

// ---------------------------------------------------------------------
// Fetch (§4.K)
// ---------------------------------------------------------------------

pub fn fetch(db: &mut Database, session: &mut Session, value_name: &str, positions_name: &str, out_name: &str) -> CoreResult<()> {
    let value = resolve_value(session, db, value_name)?;
    let positions = resolve_positions(session, positions_name)?;
    let pos = positions.to_index_array();
    let data = resolve_data(db, &value)?;
    let out: Vec<i32> = pos.iter().map(|&p| data[p]).collect();
    session.set_value(out_name, Value::Owned(out));
    Ok(())
}

// ---------------------------------------------------------------------
// Aggregate (§4.K)
// ---------------------------------------------------------------------

fn agg_flags_for(kind: AggKind) -> AggFlags {
    match kind {
        AggKind::Min => AggFlags { min: true, max: false, sum: false },
        AggKind::Max => AggFlags { min: false, max: true, sum: false },
        AggKind::Sum | AggKind::Avg => AggFlags { min: false, max: false, sum: true },
    }
}

fn numeric_from_output(kind: AggKind, out: &ScanOutput, len: usize) -> NumericValue {
    match kind {
        AggKind::Min => NumericValue::I64(out.min.unwrap_or(0)),
        AggKind::Max => NumericValue::I64(out.max.unwrap_or(0)),
        AggKind::Sum => NumericValue::I64(out.sum.unwrap_or(0)),
        AggKind::Avg => {
            if len == 0 {
                NumericValue::F64(0.0)
            } else {
                NumericValue::F64(out.sum.unwrap_or(0) as f64 / len as f64)
            }
        }
    }
}

pub fn aggregate(db: &mut Database, session: &mut Session, batch: &mut BatchContext, value_name: &str, positions_name: Option<&str>, kind: AggKind, out_name: &str) -> CoreResult<()> {
    let value = resolve_value(session, db, value_name)?;

    if batch.is_active() {
        batch.add_aggregate(value, kind, out_name)?;
        return Ok(());
    }

    let positions = resolve_optional_positions(session, positions_name)?;
    let pos_arr = positions.as_ref().map(|p| p.to_index_array());
    let data = resolve_data(db, &value)?;
    let len = pos_arr.as_ref().map_or(data.len(), |p| p.len());
    let out = scan_dispatch(db, data, pos_arr.as_deref(), &[], agg_flags_for(kind));
    session.set_numeric(out_name, numeric_from_output(kind, &out, len));
    Ok(())
}

/// Execute a closed batch plan (`BatchContext::close`) through one shared
/// scan and distribute the results into the session.
pub fn batch_close(db: &mut Database, session: &mut Session, batch: &mut BatchContext) -> CoreResult<()> {
    let plan = batch.close()?;
    let positions = plan.positions.map(|p| p.to_index_array());
    let data = resolve_data(db, &plan.value)?;
    let len = positions.as_ref().map_or(data.len(), |p| p.len());

    let select_specs: Vec<SelectSpec> = plan
        .selects
        .iter()
        .map(|s| SelectSpec { lo: scan::resolve_lo(s.lo), hi: scan::resolve_hi(s.hi) })
        .collect();
    let agg = plan.aggs.iter().fold(AggFlags::default(), |acc, a| {
        let f = agg_flags_for(a.kind);
        AggFlags { min: acc.min || f.min, max: acc.max || f.max, sum: acc.sum || f.sum }
    });

    let out = scan_dispatch(db, data, positions.as_deref(), &select_specs, agg);

    for (spec, rows) in plan.selects.iter().zip(out.selects.into_iter()) {
        session.set_positions(&spec.out_name, Positions::IndexArray(rows));
    }
    for a in &plan.aggs {
        session.set_numeric(&a.out_name, numeric_from_output(a.kind, &out, len));
    }
    Ok(())
}

pub fn batch_open(batch: &mut BatchContext) -> CoreResult<()> {
    batch.open()
}

// ---------------------------------------------------------------------
// Add / Sub (§4.K)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum AddSubOp {
    Add,
    Sub,
}

pub fn add_sub(db: &mut Database, session: &mut Session, a_name: &str, b_name: &str, op: AddSubOp, out_name: &str) -> CoreResult<()> {
    let a = resolve_value(session, db, a_name)?;
    let b = resolve_value(session, db, b_name)?;
    let a_data = resolve_data(db, &a)?;
    let b_data = resolve_data(db, &b)?;
    if a_data.len() != b_data.len() {
        return Err(CoreError::ShapeMismatch(format!("add/sub over mismatched lengths {} and {}", a_data.len(), b_data.len())));
    }
    let out: Vec<i32> = a_data
        .iter()
        .zip(b_data.iter())
        .map(|(&x, &y)| match op {
            AddSubOp::Add => x + y,
            AddSubOp::Sub => x - y,
        })
        .collect();
    session.set_value(out_name, Value::Owned(out));
    Ok(())
}

// ---------------------------------------------------------------------
// Join (§4.I / §4.K)
// ---------------------------------------------------------------------

pub fn join(
    db: &mut Database,
    session: &mut Session,
    left_value: &str,
    left_positions: &str,
    right_value: &str,
    right_positions: &str,
    out_left: &str,
    out_right: &str,
) -> CoreResult<()> {
    let v1 = resolve_value(session, db, left_value)?;
    let v2 = resolve_value(session, db, right_value)?;
    let p1 = resolve_positions(session, left_positions)?.to_index_array();
    let p2 = resolve_positions(session, right_positions)?.to_index_array();
    let d1 = resolve_data(db, &v1)?;
    let d2 = resolve_data(db, &v2)?;
    let (left, right) = join::join_hash(&db.cfg, db.pool(), d1, &p1, d2, &p2)?;
    session.set_positions(out_left, Positions::IndexArray(left));
    session.set_positions(out_right, Positions::IndexArray(right));
    Ok(())
}

// ---------------------------------------------------------------------
// Print (§4.K)
// ---------------------------------------------------------------------

/// Render a set of equal-length value-vectors as CSV-like rows, one
/// column header line followed by one line per row.
pub fn print_values(db: &Database, session: &Session, names: &[String]) -> CoreResult<String> {
    let values: Vec<Value> = names.iter().map(|n| resolve_value(session, db, n)).collect::<CoreResult<_>>()?;
    let columns: Vec<&[i32]> = values.iter().map(|v| resolve_data(db, v)).collect::<CoreResult<_>>()?;
    let len = columns.first().map_or(0, |c| c.len());
    if columns.iter().any(|c| c.len() != len) {
        return Err(CoreError::ShapeMismatch("print requires equal-length value-vectors".to_string()));
    }
    let mut out = String::new();
    out.push_str(&names.join(","));
    out.push('\n');
    for row in 0..len {
        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write!(out, "{}", col[row]).expect("write to String cannot fail");
        }
        out.push('\n');
    }
    Ok(out)
}

/// Render a list of numeric handles as a comma-separated line; floats
/// render with two decimal places.
pub fn print_numerics(session: &Session, names: &[String]) -> CoreResult<String> {
    let mut parts = Vec::with_capacity(names.len());
    for n in names {
        let v = session.get_numeric(n).ok_or_else(|| CoreError::HandleNotFound(n.clone()))?;
        parts.push(match v {
            NumericValue::I32(x) => x.to_string(),
            NumericValue::I64(x) => x.to_string(),
            NumericValue::F64(x) => format!("{x:.2}"),
        });
    }
    Ok(parts.join(","))
}
