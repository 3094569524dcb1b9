//! Application-side values handled by dumpers and loaders.

use crate::types::Numeric;
use chrono::{NaiveDate, NaiveDateTime};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// A value on the application side of the adaptation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Numeric(Numeric),
    String(String),
    /// Binary data (bytea)
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Json(serde_json::Value),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    List(List),
}

/// Runtime type of a non-null [`Value`]; the key dumpers are registered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Numeric,
    String,
    Bytes,
    Uuid,
    Json,
    Date,
    Timestamp,
    List,
}

impl ValueType {
    pub const ALL: [ValueType; 11] = [
        ValueType::Bool,
        ValueType::Int,
        ValueType::Float,
        ValueType::Numeric,
        ValueType::String,
        ValueType::Bytes,
        ValueType::Uuid,
        ValueType::Json,
        ValueType::Date,
        ValueType::Timestamp,
        ValueType::List,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Numeric => "numeric",
            ValueType::String => "string",
            ValueType::Bytes => "bytes",
            ValueType::Uuid => "uuid",
            ValueType::Json => "json",
            ValueType::Date => "date",
            ValueType::Timestamp => "timestamp",
            ValueType::List => "list",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        ValueType::ALL
            .into_iter()
            .find(|t| t.name() == lower)
            .ok_or_else(|| format!("unknown value type '{}'", s))
    }
}

impl Value {
    /// Runtime type, or `None` for `Null`.
    pub fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Numeric(_) => ValueType::Numeric,
            Value::String(_) => ValueType::String,
            Value::Bytes(_) => ValueType::Bytes,
            Value::Uuid(_) => ValueType::Uuid,
            Value::Json(_) => ValueType::Json,
            Value::Date(_) => ValueType::Date,
            Value::Timestamp(_) => ValueType::Timestamp,
            Value::List(_) => ValueType::List,
        })
    }

    /// Name of the runtime type, `"null"` for `Null`.
    pub fn type_name(&self) -> &'static str {
        self.value_type().map(ValueType::name).unwrap_or("null")
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Build a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(List::new(items.into_iter().collect()))
    }
}

/// Deepest list nesting that can be adapted.
///
/// PostgreSQL arrays have at most 6 dimensions.
pub const MAX_LIST_DEPTH: usize = 64;

/// Shared, mutable list of values.
///
/// Clones share storage, so a list may end up containing itself. Identity
/// is observable through [`List::id`].
#[derive(Clone, Default)]
pub struct List(Rc<RefCell<Vec<Value>>>);

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Borrow the elements.
    pub fn items(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    /// Identity of the underlying storage.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

thread_local! {
    /// Lists being formatted on this thread.
    static FORMATTING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
    /// List pairs being compared on this thread.
    static COMPARING: RefCell<Vec<(usize, usize)>> = const { RefCell::new(Vec::new()) };
}

/// Marks `key` as in progress on this thread until dropped.
///
/// `None` when `key` is already in progress, that is the walk came back
/// to a list through a cycle.
struct InProgress<T: PartialEq + 'static> {
    stack: &'static std::thread::LocalKey<RefCell<Vec<T>>>,
}

impl<T: PartialEq + 'static> InProgress<T> {
    fn enter(stack: &'static std::thread::LocalKey<RefCell<Vec<T>>>, key: T) -> Option<Self> {
        stack.with(|s| {
            let mut s = s.borrow_mut();
            if s.contains(&key) {
                return None;
            }
            s.push(key);
            Some(Self { stack })
        })
    }
}

impl<T: PartialEq + 'static> Drop for InProgress<T> {
    fn drop(&mut self) {
        self.stack.with(|s| s.borrow_mut().pop());
    }
}

/// Element-wise equality. Two lists that reach back to a pair already
/// being compared are equal there, so cyclic lists compare without looping.
impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match InProgress::enter(&COMPARING, (self.id(), other.id())) {
            Some(_guard) => *self.items() == *other.items(),
            None => true,
        }
    }
}

/// A list met again inside itself prints as `[...]`.
impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match InProgress::enter(&FORMATTING, self.id()) {
            Some(_guard) => f.debug_list().entries(self.items().iter()).finish(),
            None => write!(f, "[...]"),
        }
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(_guard) = InProgress::enter(&FORMATTING, self.id()) else {
            return write!(f, "[...]");
        };
        write!(f, "[")?;
        for (i, v) in self.items().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Numeric(n) => write!(f, "{}", n.as_str()),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Bytes(bytes) => {
                write!(f, "'\\x")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, "'")
            }
            Value::Uuid(u) => write!(f, "'{}'", u),
            Value::Json(json) => write!(f, "{}", json),
            Value::Date(d) => write!(f, "'{}'", d),
            Value::Timestamp(ts) => write!(f, "'{}'", ts),
            Value::List(list) => write!(f, "{}", list),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<Numeric> for Value {
    fn from(n: Numeric) -> Self {
        Value::Numeric(n)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Value::List(list)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type() {
        assert_eq!(Value::from(5).value_type(), Some(ValueType::Int));
        assert_eq!(Value::from("x").value_type(), Some(ValueType::String));
        assert_eq!(Value::Null.value_type(), None);
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::list(Vec::new()).type_name(), "list");
    }

    #[test]
    fn test_list_identity() {
        let a = List::new(vec![Value::Int(1)]);
        let b = a.clone();
        let c = List::new(vec![Value::Int(1)]);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a, c);

        b.push(Value::Int(2));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_string(), "'\\xdead'");
        assert_eq!(
            Value::list([Value::Int(1), Value::Null]).to_string(),
            "[1, NULL]"
        );
    }

    #[test]
    fn test_value_type_parse() {
        assert_eq!("INT".parse::<ValueType>().unwrap(), ValueType::Int);
        assert!("tuple".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_cyclic_list_eq_and_format() {
        let a = List::new(vec![Value::Int(1)]);
        a.push(Value::List(a.clone()));
        let b = List::new(vec![Value::Int(1)]);
        b.push(Value::List(b.clone()));
        assert!(a == b);

        let c = List::new(vec![Value::Int(2)]);
        c.push(Value::List(c.clone()));
        assert!(a != c);

        assert_eq!(format!("{:?}", a), "[Int(1), List([...])]");
        assert_eq!(Value::List(a).to_string(), "[1, [...]]");
    }
}
