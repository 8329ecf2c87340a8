//! Batch context (§4.K Batch).
//!
//! Accumulates select and aggregate operators that share a single
//! `(value-vector, position-vector)` pair while a batch is open, so that
//! `close` can execute them all through one shared-scan pass instead of
//! one scan per operator.

use crate::error::{CoreError, CoreResult};
use crate::session::{values_equal, Positions, Value};

/// Which scalar aggregate a batched aggregate operator computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    Min,
    Max,
    Sum,
    /// `SUM / length`; length 0 yields `0.0`.
    Avg,
}

/// A batched select operator, bounds already resolved from `NULL`.
pub struct BatchedSelect {
    pub lo: Option<i64>,
    pub hi: Option<i64>,
    pub out_name: String,
}

/// A batched aggregate operator.
pub struct BatchedAgg {
    pub kind: AggKind,
    pub out_name: String,
}

/// What a closed batch hands back to the dispatcher to execute.
pub struct BatchPlan {
    pub value: Value,
    pub positions: Option<Positions>,
    pub selects: Vec<BatchedSelect>,
    pub aggs: Vec<BatchedAgg>,
}

fn positions_equal(a: &Positions, b: &Positions) -> bool {
    a.to_index_array() == b.to_index_array()
}

/// Session-scoped accumulator for an open batch. At most one batch is
/// open at a time per session.
#[derive(Default)]
pub struct BatchContext {
    active: bool,
    value: Option<Value>,
    positions: Option<Positions>,
    selects: Vec<BatchedSelect>,
    aggs: Vec<BatchedAgg>,
}

impl BatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Open a fresh batch. Errors if one is already open.
    pub fn open(&mut self) -> CoreResult<()> {
        if self.active {
            return Err(CoreError::BatchError("a batch is already open".to_string()));
        }
        self.active = true;
        self.value = None;
        self.positions = None;
        self.selects.clear();
        self.aggs.clear();
        Ok(())
    }

    /// Add a select operator to the open batch, checking the §4.K
    /// compatibility rules against whatever (value, positions) pair the
    /// batch has already committed to.
    pub fn add_select(&mut self, value: Value, positions: Option<Positions>, lo: Option<i64>, hi: Option<i64>, out_name: &str) -> CoreResult<()> {
        self.require_active()?;
        match (&self.value, self.positions.is_some()) {
            (None, _) => {
                self.value = Some(value);
                self.positions = positions;
            }
            (Some(shared), true) => {
                if !values_equal(shared, &value) {
                    return Err(CoreError::BatchError("select value-vector does not match the batch".to_string()));
                }
                let incoming = positions.ok_or_else(|| CoreError::BatchError("select into a position-restricted batch requires a position-vector".to_string()))?;
                if !positions_equal(self.positions.as_ref().unwrap(), &incoming) {
                    return Err(CoreError::BatchError("select position-vector does not match the batch".to_string()));
                }
            }
            (Some(shared), false) => {
                // the batch has only seen aggregates so far; this select
                // installs the shared position-vector
                if !values_equal(shared, &value) {
                    return Err(CoreError::BatchError("select value-vector does not match the batch".to_string()));
                }
                self.positions = positions;
            }
        }
        self.selects.push(BatchedSelect { lo, hi, out_name: out_name.to_string() });
        Ok(())
    }

    /// Add an aggregate operator to the open batch. Aggregates only
    /// constrain the value-vector, never the position-vector.
    pub fn add_aggregate(&mut self, value: Value, kind: AggKind, out_name: &str) -> CoreResult<()> {
        self.require_active()?;
        match &self.value {
            None => self.value = Some(value),
            Some(shared) => {
                if !values_equal(shared, &value) {
                    return Err(CoreError::BatchError("aggregate value-vector does not match the batch".to_string()));
                }
            }
        }
        self.aggs.push(BatchedAgg { kind, out_name: out_name.to_string() });
        Ok(())
    }

    /// Conclude the batch, handing back everything needed to run it
    /// through a single shared scan.
    pub fn close(&mut self) -> CoreResult<BatchPlan> {
        self.require_active()?;
        self.active = false;
        let value = self.value.take().ok_or_else(|| CoreError::BatchError("batch closed with no operators".to_string()))?;
        Ok(BatchPlan {
            value,
            positions: self.positions.take(),
            selects: std::mem::take(&mut self.selects),
            aggs: std::mem::take(&mut self.aggs),
        })
    }

    fn require_active(&self) -> CoreResult<()> {
        if !self.active {
            return Err(CoreError::BatchError("no batch is open".to_string()));
        }
        Ok(())
    }
}
