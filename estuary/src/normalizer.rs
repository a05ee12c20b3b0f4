//! Shape normalization between the ORM's document convention and the
//! store's native one.
//!
//! Outbound, every record or identifier leaving the adapter has the
//! store-native `_id` field rewritten to the ORM's generic `id` field.
//! Inbound, identifier values in `where` predicates travel the other way,
//! and caller-supplied identifier keys are stripped from update values
//! because the store rejects identifier mutation.

use crate::common::{RecordId, Value, DOC_ID, ID_FIELD};
use crate::document::Document;
use crate::driver::RemovalOutcome;
use crate::errors::EstuaryResult;
use crate::schema::Schema;

/// Rewrites the store-native identifier of a single record to the ORM's
/// generic `id` field.
pub fn normalize_record(record: Document) -> Document {
    let mut record = record;
    if let Some(id) = record.remove(DOC_ID) {
        record.put_unchecked(ID_FIELD, id);
    }
    record
}

/// Rewrites the store-native identifier for every record in a result list,
/// preserving order.
pub fn normalize_records(records: Vec<Document>) -> Vec<Document> {
    records.into_iter().map(normalize_record).collect()
}

/// Shapes a batch of inbound value documents through the schema,
/// independently and order-preserving.
pub fn shape_many(schema: &Schema, values: &[Document]) -> EstuaryResult<Vec<Document>> {
    values.iter().map(|value| schema.shape(value)).collect()
}

/// Removes caller-supplied identifier keys from an update's value document.
/// The store rejects identifier mutation, so both the ORM-side `id` and a
/// raw `_id` are dropped before shaping.
pub fn strip_identifier_keys(values: &Document) -> Document {
    let mut stripped = values.clone();
    if stripped.remove(ID_FIELD).is_some() || stripped.remove(DOC_ID).is_some() {
        log::warn!("Stripping identifier keys from update values; identifiers cannot be mutated");
    }
    stripped
}

/// Rewrites ORM-side identifier references in a `where` predicate into the
/// store's native shape: the `id` key becomes `_id` and its string values
/// become record identifiers, including inside operator sub-documents and
/// membership arrays.
pub fn denormalize_filter(filter: &Document) -> Document {
    let mut native = Document::new();
    for (key, value) in filter.iter() {
        if key == ID_FIELD {
            native.put_unchecked(DOC_ID, to_identifier_value(value));
        } else {
            native.put_unchecked(key, value.clone());
        }
    }
    native
}

fn to_identifier_value(value: &Value) -> Value {
    match value {
        Value::String(s) if !s.is_empty() => match RecordId::parse(s) {
            Ok(id) => Value::RecordId(id),
            Err(_) => value.clone(),
        },
        Value::Array(entries) => {
            Value::Array(entries.iter().map(to_identifier_value).collect())
        }
        Value::Document(operators) => {
            let mut converted = Document::new();
            for (op, operand) in operators.iter() {
                converted.put_unchecked(op, to_identifier_value(operand));
            }
            Value::Document(converted)
        }
        _ => value.clone(),
    }
}

/// Normalizes a removal report into a uniform list of `{id}` records.
///
/// The underlying call may report a count, a bare identifier, or a list of
/// identifiers; all three shapes collapse into one record per removed
/// document. A bare count falls back to the identifiers captured before the
/// removal was issued.
pub fn normalize_removed(outcome: RemovalOutcome, captured_ids: &[Value]) -> Vec<Document> {
    let ids: Vec<Value> = match outcome {
        RemovalOutcome::Count(count) => {
            if count as usize != captured_ids.len() {
                log::warn!(
                    "Store reported {} removed documents but {} were matched beforehand",
                    count,
                    captured_ids.len()
                );
            }
            captured_ids.to_vec()
        }
        RemovalOutcome::Removed(id) => vec![id],
        RemovalOutcome::RemovedMany(ids) => ids,
    };

    ids.into_iter()
        .map(|id| {
            let mut record = Document::new();
            record.put_unchecked(ID_FIELD, id);
            record
        })
        .collect()
}
