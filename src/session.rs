//! Handle pool / session (§4.G).
//!
//! Three name-keyed, linearly-scanned tables hold a session's live
//! value-vector, position-vector, and numeric handles. A second insert
//! under an existing name replaces (and frees) the previous binding.
//!
//! A `Value::Column` handle is a reference by `(table, column)` identity
//! rather than a borrow: the underlying mmap'd data is resolved against
//! the database at the point of use. That sidesteps holding a live
//! borrow inside a long-lived session and makes the "transient
//! column-view must be released by its consuming operator" rule (§4.K) a
//! non-issue — such a view is just a local value dropped at the end of
//! the call that built it, the way §9's design notes suggest relying on
//! ordinary RAII instead of an explicit release API.

use crate::bitvec::BitVec;
use crate::config::Config;

/// A value-vector: either a live view onto a column, or an owned dense
/// buffer produced by an operator (fetch, add/sub, load).
#[derive(Debug, Clone)]
pub enum Value {
    /// A borrowed view onto `table`'s `column`-th column.
    Column { table: String, column: usize },
    /// An owned dense `i32` buffer ("partial column").
    Owned(Vec<i32>),
}

/// A position-vector: an index array or a bit-mask over row indices.
#[derive(Debug, Clone)]
pub enum Positions {
    IndexArray(Vec<usize>),
    Mask(BitVec),
}

impl Positions {
    pub fn to_index_array(&self) -> Vec<usize> {
        match self {
            Positions::IndexArray(v) => v.clone(),
            Positions::Mask(m) => (0..m.len()).filter(|&i| m.get(i)).collect(),
        }
    }
}

/// A scalar aggregate result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    I32(i32),
    I64(i64),
    F64(f64),
}

struct HandleTable<T> {
    entries: Vec<(String, T)>,
    capacity: usize,
    growth_factor: usize,
}

impl<T> HandleTable<T> {
    fn new(initial_capacity: usize, growth_factor: usize) -> Self {
        Self {
            entries: Vec::with_capacity(initial_capacity),
            capacity: initial_capacity,
            growth_factor,
        }
    }

    fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Insert, replacing (and dropping) any existing binding under
    /// `name`. Grows the table's tracked capacity by doubling when full.
    fn insert(&mut self, name: &str, value: T) {
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
            return;
        }
        if self.entries.len() >= self.capacity {
            self.capacity *= self.growth_factor.max(2);
            self.entries.reserve(self.capacity - self.entries.len());
        }
        self.entries.push((name.to_string(), value));
    }

    fn remove(&mut self, name: &str) -> Option<T> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A client context: the per-connection pool of live handles.
pub struct Session {
    valvecs: HandleTable<Value>,
    posvecs: HandleTable<Positions>,
    numerics: HandleTable<NumericValue>,
}

impl Session {
    pub fn new(cfg: &Config) -> Self {
        Self {
            valvecs: HandleTable::new(cfg.initial_handle_capacity, cfg.handle_growth_factor),
            posvecs: HandleTable::new(cfg.initial_handle_capacity, cfg.handle_growth_factor),
            numerics: HandleTable::new(cfg.initial_handle_capacity, cfg.handle_growth_factor),
        }
    }

    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.valvecs.get(name)
    }

    pub fn set_value(&mut self, name: &str, value: Value) {
        self.valvecs.insert(name, value);
    }

    pub fn remove_value(&mut self, name: &str) -> Option<Value> {
        self.valvecs.remove(name)
    }

    pub fn get_positions(&self, name: &str) -> Option<&Positions> {
        self.posvecs.get(name)
    }

    pub fn set_positions(&mut self, name: &str, value: Positions) {
        self.posvecs.insert(name, value);
    }

    pub fn remove_positions(&mut self, name: &str) -> Option<Positions> {
        self.posvecs.remove(name)
    }

    pub fn get_numeric(&self, name: &str) -> Option<&NumericValue> {
        self.numerics.get(name)
    }

    pub fn set_numeric(&mut self, name: &str, value: NumericValue) {
        self.numerics.insert(name, value);
    }

    /// Drop every handle, the way a session reset or disconnect would.
    pub fn clear(&mut self) {
        self.valvecs.clear();
        self.posvecs.clear();
        self.numerics.clear();
    }
}

/// Two value-vector handles are equal either by literal identity or, for
/// two column views, by referring to the same `(table, column)` (§4.K
/// batching compatibility rule).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Column { table: t1, column: c1 }, Value::Column { table: t2, column: c2 }) => t1 == t2 && c1 == c2,
        (Value::Owned(x), Value::Owned(y)) => std::ptr::eq(x.as_ptr(), y.as_ptr()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let cfg = Config::default();
        let mut s = Session::new(&cfg);
        s.set_value("v", Value::Owned(vec![1, 2, 3]));
        match s.get_value("v").unwrap() {
            Value::Owned(v) => assert_eq!(v, &vec![1, 2, 3]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn second_insert_replaces() {
        let cfg = Config::default();
        let mut s = Session::new(&cfg);
        s.set_value("v", Value::Owned(vec![1]));
        s.set_value("v", Value::Owned(vec![2, 3]));
        match s.get_value("v").unwrap() {
            Value::Owned(v) => assert_eq!(v, &vec![2, 3]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut cfg = Config::default();
        cfg.initial_handle_capacity = 1;
        let mut s = Session::new(&cfg);
        for i in 0..10 {
            s.set_value(&format!("v{i}"), Value::Owned(vec![i]));
        }
        for i in 0..10 {
            assert!(s.get_value(&format!("v{i}")).is_some());
        }
    }

    #[test]
    fn column_values_equal_by_identity() {
        let a = Value::Column { table: "t".into(), column: 0 };
        let b = Value::Column { table: "t".into(), column: 0 };
        let c = Value::Column { table: "t".into(), column: 1 };
        assert!(values_equal(&a, &b));
        assert!(!values_equal(&a, &c));
    }

    #[test]
    fn mask_to_index_array() {
        let mut m = BitVec::new(5);
        m.set(1);
        m.set(3);
        let p = Positions::Mask(m);
        assert_eq!(p.to_index_array(), vec![1, 3]);
    }
}
