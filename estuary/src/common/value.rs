use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use crate::common::RecordId;
use crate::document::Document;

/// Compare two floats for equality with NaN treated as equal to itself,
/// so that [Value] can implement [Eq].
#[inline]
fn num_eq_float(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        true
    } else {
        a == b
    }
}

/// Compare two floats with a total ordering. NaN sorts after all other values.
#[inline]
fn num_cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Represents a [Document] field value.
///
/// # Purpose
/// A unified representation for everything the adapter moves between the ORM
/// and the store: primitives, strings, nested documents, arrays, binary data,
/// and store-generated record identifiers.
///
/// # Characteristics
/// - **Comparable**: implements a total order with cross-width numeric
///   comparison, so `I32(3)` equals `I64(3)` and sorts accordingly
/// - **Serializable**: serde support behind the `serde` feature
/// - **Default**: defaults to [Value::Null]
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a signed 32-bit integer value.
    I32(i32),
    /// Represents a signed 64-bit integer value.
    I64(i64),
    /// Represents a 64-bit floating point value.
    F64(f64),
    /// Represents a string value.
    String(String),
    /// Represents a store-generated record identifier.
    RecordId(RecordId),
    /// Represents a nested document value.
    Document(Document),
    /// Represents an array value.
    Array(Vec<Value>),
    /// Represents binary data. It cannot be indexed or queried.
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_record_id(&self) -> bool {
        matches!(self, Value::RecordId(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::I32(_) | Value::I64(_) | Value::F64(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(i) => Some(*i as i64),
            Value::I64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I32(i) => Some(*i as f64),
            Value::I64(i) => Some(*i as f64),
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_record_id(&self) -> Option<&RecordId> {
        match self {
            Value::RecordId(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Name of the variant, used in validation error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::I32(_) | Value::I64(_) => "integer",
            Value::F64(_) => "float",
            Value::String(_) => "string",
            Value::RecordId(_) => "record-id",
            Value::Document(_) => "document",
            Value::Array(_) => "array",
            Value::Bytes(_) => "binary",
        }
    }

    /// Rank used to totally order values of different variants.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::I32(_) | Value::I64(_) | Value::F64(_) => 2,
            Value::String(_) => 3,
            Value::RecordId(_) => 4,
            Value::Document(_) => 5,
            Value::Array(_) => 6,
            Value::Bytes(_) => 7,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::I32(a), Value::I64(b)) => (*a as i64) == *b,
            (Value::I64(a), Value::I32(b)) => *a == (*b as i64),
            (Value::F64(a), Value::F64(b)) => num_eq_float(*a, *b),
            (Value::F64(a), Value::I32(b)) => num_eq_float(*a, *b as f64),
            (Value::F64(a), Value::I64(b)) => num_eq_float(*a, *b as f64),
            (Value::I32(a), Value::F64(b)) => num_eq_float(*a as f64, *b),
            (Value::I64(a), Value::F64(b)) => num_eq_float(*a as f64, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::RecordId(a), Value::RecordId(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::I32(a), Value::I32(b)) => a.cmp(b),
            (Value::I64(a), Value::I64(b)) => a.cmp(b),
            (Value::I32(a), Value::I64(b)) => (*a as i64).cmp(b),
            (Value::I64(a), Value::I32(b)) => a.cmp(&(*b as i64)),
            (Value::F64(a), Value::F64(b)) => num_cmp_float(*a, *b),
            (Value::F64(a), Value::I32(b)) => num_cmp_float(*a, *b as f64),
            (Value::F64(a), Value::I64(b)) => num_cmp_float(*a, *b as f64),
            (Value::I32(a), Value::F64(b)) => num_cmp_float(*a as f64, *b),
            (Value::I64(a), Value::F64(b)) => num_cmp_float(*a as f64, *b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::RecordId(a), Value::RecordId(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I32(i) => write!(f, "{}", i),
            Value::I64(i) => write!(f, "{}", i),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::RecordId(id) => write!(f, "{}", id),
            Value::Document(doc) => write!(f, "{}", doc),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Value::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<RecordId> for Value {
    fn from(value: RecordId) -> Self {
        Value::RecordId(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}
