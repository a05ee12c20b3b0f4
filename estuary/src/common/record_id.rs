use std::fmt::{Debug, Display, Formatter};

use uuid::Uuid;

use crate::errors::{ErrorKind, EstuaryError, EstuaryResult};

/// A store-generated record identifier.
///
/// The store assigns a `RecordId` to every persisted document under the
/// native `_id` field; the adapter rewrites it to the ORM's generic `id`
/// field on the way out and back to `_id` on the way in. Identifiers are
/// UUID v4 strings, so they are unique without any coordination.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordId {
    value: String,
}

impl RecordId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        RecordId {
            value: Uuid::new_v4().to_string(),
        }
    }

    /// Wraps an identifier received from the caller, rejecting empty input.
    pub fn parse(value: &str) -> EstuaryResult<Self> {
        if value.is_empty() {
            log::error!("Record id cannot be empty");
            return Err(EstuaryError::new(
                "Record id cannot be empty",
                ErrorKind::InvalidId,
            ));
        }
        Ok(RecordId {
            value: value.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl Default for RecordId {
    fn default() -> Self {
        RecordId::new()
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Debug for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecordId({})", self.value)
    }
}
