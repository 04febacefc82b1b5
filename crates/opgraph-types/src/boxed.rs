//! Boxed values
//!
//! A boxed value wraps a runtime [`Value`] without changing its value
//! semantics: two boxes compare equal when their values do, and a box compares
//! equal to its bare value. On top of the value a box carries an optional
//! identity slot and, for values reached through a boxed dict or list, the
//! relative access path from the container it was read out of.

use std::fmt;

use opgraph_error::{TypesError, TypesResult};

use crate::value::Value;

//-----------------------------------------------------------------------------
// Paths
//-----------------------------------------------------------------------------

/// Which values get boxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoxingMode {
    /// `none` and booleans are left bare.
    #[default]
    Trace,
    /// Every value is boxed, including `none` and booleans.
    Legacy,
}

/// One step of a relative access path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathEdge {
    DictKey(String),
    ListIndex(usize),
}

impl fmt::Display for PathEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathEdge::DictKey(key) => write!(f, "key/{}", key),
            PathEdge::ListIndex(index) => write!(f, "index/{}", index),
        }
    }
}

/// Access path of a value relative to the outermost boxed container it was
/// read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RefPath {
    edges: Vec<PathEdge>,
}

impl RefPath {
    pub fn new(edges: Vec<PathEdge>) -> Self {
        Self { edges }
    }

    pub fn edges(&self) -> &[PathEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// This path extended by one edge.
    pub fn child(&self, edge: PathEdge) -> Self {
        let mut edges = self.edges.clone();
        edges.push(edge);
        Self { edges }
    }
}

impl fmt::Display for RefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, edge) in self.edges.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", edge)?;
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------
// Boxed values
//-----------------------------------------------------------------------------

/// A value with an identity slot and a relative access path.
#[derive(Debug, Clone)]
pub struct BoxedValue {
    value: Value,
    id: Option<i64>,
    path: RefPath,
    mode: BoxingMode,
}

/// Either a bare value or a boxed one, as returned by [`box_value`].
#[derive(Debug, Clone, PartialEq)]
pub enum MaybeBoxed {
    Plain(Value),
    Boxed(BoxedValue),
}

/// Box `value` according to `mode`.
pub fn box_value(value: Value, mode: BoxingMode) -> MaybeBoxed {
    box_at(value, mode, RefPath::default())
}

fn box_at(value: Value, mode: BoxingMode, path: RefPath) -> MaybeBoxed {
    match (&value, mode) {
        (Value::None | Value::Bool(_), BoxingMode::Trace) => MaybeBoxed::Plain(value),
        _ => MaybeBoxed::Boxed(BoxedValue {
            value,
            id: None,
            path,
            mode,
        }),
    }
}

/// The underlying value. `unbox(box_value(x, mode)) == x` for every mode.
pub fn unbox(value: MaybeBoxed) -> Value {
    match value {
        MaybeBoxed::Plain(value) => value,
        MaybeBoxed::Boxed(boxed) => boxed.value,
    }
}

impl MaybeBoxed {
    pub fn is_boxed(&self) -> bool {
        matches!(self, MaybeBoxed::Boxed(_))
    }

    pub fn value(&self) -> &Value {
        match self {
            MaybeBoxed::Plain(value) => value,
            MaybeBoxed::Boxed(boxed) => &boxed.value,
        }
    }

    pub fn as_boxed(&self) -> Option<&BoxedValue> {
        match self {
            MaybeBoxed::Boxed(boxed) => Some(boxed),
            MaybeBoxed::Plain(_) => None,
        }
    }
}

impl BoxedValue {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn mode(&self) -> BoxingMode {
        self.mode
    }

    /// Path from the outermost container this value was read from.
    pub fn path(&self) -> &RefPath {
        &self.path
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// The identity slot, filled with a fresh random id if empty.
    pub fn ensure_id(&mut self) -> i64 {
        *self.id.get_or_insert_with(rand::random::<i64>)
    }

    /// Dict entry under `key`, boxed with a `DictKey` edge appended.
    pub fn get(&self, key: &str) -> TypesResult<MaybeBoxed> {
        let fields = self.value.as_dict().ok_or_else(|| {
            TypesError::invalid_path(format!("cannot read key {:?} from a {}", key, self.value.kind()))
        })?;
        let child = fields
            .get(key)
            .ok_or_else(|| TypesError::invalid_path(format!("no key {:?}", key)))?;
        Ok(box_at(
            child.clone(),
            self.mode,
            self.path.child(PathEdge::DictKey(key.to_string())),
        ))
    }

    /// List element at `index`, boxed with a `ListIndex` edge appended.
    pub fn index(&self, index: usize) -> TypesResult<MaybeBoxed> {
        let items = self.value.as_list().ok_or_else(|| {
            TypesError::invalid_path(format!("cannot index a {}", self.value.kind()))
        })?;
        let child = items.get(index).ok_or_else(|| {
            TypesError::invalid_path(format!("index {} out of range for length {}", index, items.len()))
        })?;
        Ok(box_at(
            child.clone(),
            self.mode,
            self.path.child(PathEdge::ListIndex(index)),
        ))
    }

    /// Elements of a boxed list, each carrying its index edge. Empty for
    /// non-list values.
    pub fn iter(&self) -> impl Iterator<Item = MaybeBoxed> + '_ {
        let len = self.value.as_list().map_or(0, <[Value]>::len);
        (0..len).filter_map(move |i| self.index(i).ok())
    }

    /// Follow `path` down from this value.
    pub fn lookup_path(&self, path: &[PathEdge]) -> TypesResult<MaybeBoxed> {
        let Some((first, rest)) = path.split_first() else {
            return Ok(MaybeBoxed::Boxed(self.clone()));
        };
        let child = match first {
            PathEdge::DictKey(key) => self.get(key)?,
            PathEdge::ListIndex(index) => self.index(*index)?,
        };
        if rest.is_empty() {
            return Ok(child);
        }
        match child {
            MaybeBoxed::Boxed(boxed) => boxed.lookup_path(rest),
            MaybeBoxed::Plain(value) => Err(TypesError::invalid_path(format!(
                "path continues past a {} value",
                value.kind()
            ))),
        }
    }
}

impl PartialEq for BoxedValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialEq<Value> for BoxedValue {
    fn eq(&self, other: &Value) -> bool {
        &self.value == other
    }
}

impl PartialEq<Value> for MaybeBoxed {
    fn eq(&self, other: &Value) -> bool {
        self.value() == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nested() -> Value {
        Value::dict([(
            "rows",
            Value::List(vec![
                Value::dict([("a", Value::Int(1))]),
                Value::dict([("a", Value::Int(2))]),
            ]),
        )])
    }

    #[test]
    fn trace_mode_leaves_none_and_bool_bare() {
        assert!(!box_value(Value::None, BoxingMode::Trace).is_boxed());
        assert!(!box_value(Value::Bool(true), BoxingMode::Trace).is_boxed());
        assert!(box_value(Value::Bool(true), BoxingMode::Legacy).is_boxed());
        assert!(box_value(Value::Int(3), BoxingMode::Trace).is_boxed());
    }

    #[test]
    fn boxes_compare_by_value() {
        let a = box_value(Value::from("x"), BoxingMode::Trace);
        let b = box_value(Value::from("x"), BoxingMode::Trace);
        assert_eq!(a, b);
        assert!(a == Value::from("x"));
    }

    #[test]
    fn children_carry_relative_paths() {
        let MaybeBoxed::Boxed(root) = box_value(nested(), BoxingMode::Trace) else {
            panic!("dict should be boxed");
        };
        let MaybeBoxed::Boxed(rows) = root.get("rows").unwrap() else {
            panic!("list should be boxed");
        };
        let second = rows.iter().nth(1).unwrap();
        let second = second.as_boxed().unwrap();
        assert_eq!(
            second.path().edges(),
            &[PathEdge::DictKey("rows".into()), PathEdge::ListIndex(1)]
        );

        let found = root.lookup_path(&second.path().edges().to_vec()).unwrap();
        assert_eq!(found, *second.value());
        assert_eq!(second.path().to_string(), "key/rows/index/1");
    }

    #[test]
    fn bad_paths_are_reported() {
        let MaybeBoxed::Boxed(root) = box_value(nested(), BoxingMode::Trace) else {
            panic!("dict should be boxed");
        };
        assert!(root.get("missing").is_err());
        assert!(root.index(0).is_err());
        assert!(root
            .lookup_path(&[PathEdge::DictKey("rows".into()), PathEdge::ListIndex(9)])
            .is_err());
    }

    #[test]
    fn ids_are_assigned_once() {
        let MaybeBoxed::Boxed(mut boxed) = box_value(Value::Int(1), BoxingMode::Trace) else {
            panic!("int should be boxed");
        };
        assert_eq!(boxed.id(), None);
        let id = boxed.ensure_id();
        assert_eq!(boxed.ensure_id(), id);
    }
}
