use smallvec::SmallVec;

use crate::common::DOC_ID;
use crate::document::Document;
use crate::errors::EstuaryResult;

/// A summary function applied to one field across each group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccumulatorOp {
    Sum,
    Average,
    Min,
    Max,
}

impl AccumulatorOp {
    /// The criteria key that requests this accumulator.
    pub fn criteria_key(&self) -> &'static str {
        match self {
            AccumulatorOp::Sum => "sum",
            AccumulatorOp::Average => "average",
            AccumulatorOp::Min => "min",
            AccumulatorOp::Max => "max",
        }
    }
}

/// One accumulator entry: the operation and the field it summarizes.
/// The result is reported under the same field name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accumulator {
    pub(crate) op: AccumulatorOp,
    pub(crate) field: String,
}

impl Accumulator {
    pub fn new(op: AccumulatorOp, field: &str) -> Accumulator {
        Accumulator {
            op,
            field: field.to_string(),
        }
    }

    pub fn op(&self) -> AccumulatorOp {
        self.op
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

/// The group stage of an aggregation request: the fields to group by and the
/// accumulators to compute per group.
///
/// An empty key list forms a single global group, so plain `sum`/`average`
/// requests without `groupBy` still produce one summary record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupSpec {
    pub(crate) keys: SmallVec<[String; 4]>,
    pub(crate) accumulators: Vec<Accumulator>,
}

impl GroupSpec {
    pub fn new(keys: Vec<String>, accumulators: Vec<Accumulator>) -> GroupSpec {
        GroupSpec {
            keys: keys.into(),
            accumulators,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn accumulators(&self) -> &[Accumulator] {
        &self.accumulators
    }
}

/// One stage of the two-stage aggregation pipeline the translator emits:
/// a match over the `where` predicate followed by a group stage.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineStage {
    Match(Document),
    Group(GroupSpec),
}

/// Flattens grouped aggregation results into one flat record per group.
///
/// The store reports each group under a synthetic `_id` composed of the
/// grouped field values. This folds those values back to top-level fields
/// and discards the synthetic identifier, leaving accumulator results in
/// place.
pub fn flatten_grouped(records: Vec<Document>) -> EstuaryResult<Vec<Document>> {
    let mut flattened = Vec::with_capacity(records.len());
    for record in records {
        let mut flat = Document::new();
        if let Some(grouped) = record.get(DOC_ID).as_document() {
            for (field, value) in grouped.iter() {
                flat.put(field, value.clone())?;
            }
        }
        for (field, value) in record.iter() {
            if field != DOC_ID {
                flat.put(field, value.clone())?;
            }
        }
        flattened.push(flat);
    }
    Ok(flattened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::doc;

    #[test]
    fn test_criteria_keys() {
        assert_eq!(AccumulatorOp::Sum.criteria_key(), "sum");
        assert_eq!(AccumulatorOp::Average.criteria_key(), "average");
        assert_eq!(AccumulatorOp::Min.criteria_key(), "min");
        assert_eq!(AccumulatorOp::Max.criteria_key(), "max");
    }

    #[test]
    fn test_flatten_folds_grouped_values_to_top_level() {
        let mut record = doc! { total: 42 };
        record.put_unchecked(DOC_ID, doc! { city: "NY", state: "NY" });

        let flattened = flatten_grouped(vec![record]).unwrap();
        assert_eq!(flattened.len(), 1);
        let flat = &flattened[0];
        assert_eq!(flat.get("city"), Value::String("NY".to_string()));
        assert_eq!(flat.get("state"), Value::String("NY".to_string()));
        assert_eq!(flat.get("total"), Value::I32(42));
        assert!(!flat.contains(DOC_ID));
    }

    #[test]
    fn test_flatten_discards_null_identifier_of_global_group() {
        let mut record = doc! { total: 10 };
        record.put_unchecked(DOC_ID, Value::Null);

        let flattened = flatten_grouped(vec![record]).unwrap();
        let flat = &flattened[0];
        assert_eq!(flat.size(), 1);
        assert_eq!(flat.get("total"), Value::I32(10));
    }

    #[test]
    fn test_flatten_preserves_record_order() {
        let mut first = doc! { total: 1 };
        first.put_unchecked(DOC_ID, doc! { city: "A" });
        let mut second = doc! { total: 2 };
        second.put_unchecked(DOC_ID, doc! { city: "B" });

        let flattened = flatten_grouped(vec![first, second]).unwrap();
        assert_eq!(flattened[0].get("city"), Value::String("A".to_string()));
        assert_eq!(flattened[1].get("city"), Value::String("B".to_string()));
    }
}
