use im::OrdMap;
use std::fmt::{Debug, Display, Formatter};

use crate::common::{RecordId, Value, DOC_ID};
use crate::errors::{ErrorKind, EstuaryError, EstuaryResult};

/// A flat document exchanged between the ORM and the store.
///
/// Documents are key-value pairs where the key is always a [String] and the
/// value is a [Value]. Nested structure is expressed with [Value::Document]
/// values, not with composite keys — the adapter never splits field names.
///
/// The `_id` field is reserved for the store-native record identifier: the
/// store assigns it on insert, and [`put`](Document::put) rejects manual
/// writes of anything but a [RecordId] under that key. Everything the ORM
/// sees carries the generic `id` field instead (see the normalizer).
///
/// The backing map is a persistent ordered map, so cloning a document is
/// O(1) and mutation shares structure with the original.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document { data: OrdMap::new() }
    }

    /// Checks if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of fields in the document.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates the specified [Value] with the specified key.
    ///
    /// If the key already exists its value is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, or if the key is the reserved
    /// `_id` field and the value is not a [RecordId].
    pub fn put<T: Into<Value>>(&mut self, key: &str, value: T) -> EstuaryResult<()> {
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(EstuaryError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }

        let value = value.into();
        if key == DOC_ID && !value.is_record_id() {
            log::error!("Document id is assigned by the store and cannot be set manually");
            return Err(EstuaryError::new(
                "Document id is assigned by the store and cannot be set manually",
                ErrorKind::InvalidOperation,
            ));
        }

        self.data.insert(key.to_string(), value);
        Ok(())
    }

    /// Inserts a key-value pair without the reserved-field guard.
    ///
    /// The driver layer uses this for synthetic identifiers, e.g. the
    /// grouped `_id` produced by an aggregation stage and the identifier
    /// filters built for post-update re-fetch.
    pub(crate) fn put_unchecked<T: Into<Value>>(&mut self, key: &str, value: T) {
        self.data.insert(key.to_string(), value.into());
    }

    /// Returns the [Value] associated with the key, or [Value::Null] if the
    /// document contains no mapping for it.
    pub fn get(&self, key: &str) -> Value {
        match self.data.get(key) {
            Some(value) => value.clone(),
            None => Value::Null,
        }
    }

    /// Removes a key from the document, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Checks whether the document contains the given key.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the field names of this document.
    pub fn fields(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    /// Iterates over the document's key-value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    /// Returns the store-native record identifier, if the document has one.
    pub fn record_id(&self) -> Option<RecordId> {
        match self.data.get(DOC_ID) {
            Some(Value::RecordId(id)) => Some(id.clone()),
            _ => None,
        }
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// Strips the surrounding quotes a string literal key picks up from
/// `stringify!` inside the [doc!] macro.
pub fn strip_quotes(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates an Estuary [Document] with JSON-like syntax.
///
/// # Examples
///
/// ```rust
/// use estuary::doc;
///
/// // Empty document
/// let empty = doc! {};
///
/// // Simple key-value pairs
/// let simple = doc! {
///     name: "Alice",
///     age: 30
/// };
///
/// // Nested documents and arrays
/// let criteria = doc! {
///     "where": { name: "Alice" },
///     limit: 10,
///     sort: { age: "desc" }
/// };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::document::Document::new()
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::document::Document::new();
            $(
                doc.put(&$crate::document::strip_quotes(stringify!($key)), $crate::doc_value!($value))
                    .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

/// Helper macro to convert values for the [doc!] macro.
/// Handles nested documents, arrays, and expressions.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
