//! Criteria-to-query translation.
//!
//! A criteria object is an ORM-level query descriptor: an optional `where`
//! predicate plus modifiers (`limit`, `skip`, `sort`) or an aggregation
//! request (`groupBy` with `sum`/`average`/`min`/`max` accumulators).
//! [Query::parse] normalizes it into either a simple query — the `where`
//! sub-object as the filter, every other key as [FindOptions] — or a
//! two-stage aggregation pipeline (match, then group).
//!
//! Parsing is synchronous and fails fast with [ErrorKind::CriteriaError]
//! before any connection is opened or I/O performed.

mod group;
mod options;

pub use group::*;
pub use options::*;

use options::SortFields;

use crate::common::{SortOrder, Value, GROUP_BY_KEY, LIMIT_KEY, SKIP_KEY, SORT_KEY, WHERE_KEY};
use crate::document::Document;
use crate::errors::{ErrorKind, EstuaryError, EstuaryResult};

/// A parsed, validated criteria object.
///
/// Exposes the `where` predicate as [filter](Query::filter), the remaining
/// modifiers as [options](Query::options), and — for aggregation requests —
/// the group specification as [group](Query::group).
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    filter: Document,
    options: FindOptions,
    group: Option<GroupSpec>,
}

impl Query {
    /// Parses a criteria document.
    ///
    /// # Errors
    ///
    /// Fails with [ErrorKind::CriteriaError] when `where` is not a document,
    /// `limit`/`skip` are not non-negative integers, a `sort` entry carries
    /// an unknown direction, an aggregation key is not an array of field
    /// names, or the criteria contains an unrecognized modifier.
    pub fn parse(criteria: &Document) -> EstuaryResult<Query> {
        let mut filter = Document::new();
        let mut options = FindOptions::new();
        let mut group_keys: Vec<String> = Vec::new();
        let mut accumulators: Vec<Accumulator> = Vec::new();
        let mut grouped = false;

        for (key, value) in criteria.iter() {
            match key.as_str() {
                WHERE_KEY => match value {
                    Value::Document(predicate) => filter = predicate.clone(),
                    Value::Null => {}
                    other => {
                        return Err(criteria_error(&format!(
                            "'where' must be a document, found {}",
                            other.type_name()
                        )))
                    }
                },
                LIMIT_KEY => options.limit = Some(non_negative(value, LIMIT_KEY)?),
                SKIP_KEY => options.skip = Some(non_negative(value, SKIP_KEY)?),
                SORT_KEY => options.sort = parse_sort(value)?,
                GROUP_BY_KEY => {
                    group_keys = string_list(value, GROUP_BY_KEY)?;
                    grouped = true;
                }
                other => {
                    let op = match other {
                        "sum" => Some(AccumulatorOp::Sum),
                        "average" => Some(AccumulatorOp::Average),
                        "min" => Some(AccumulatorOp::Min),
                        "max" => Some(AccumulatorOp::Max),
                        _ => None,
                    };
                    match op {
                        Some(op) => {
                            for field in string_list(value, other)? {
                                accumulators.push(Accumulator::new(op, &field));
                            }
                            grouped = true;
                        }
                        None => {
                            return Err(criteria_error(&format!(
                                "Unrecognized criteria modifier '{}'",
                                other
                            )))
                        }
                    }
                }
            }
        }

        let group = if grouped {
            Some(GroupSpec::new(group_keys, accumulators))
        } else {
            None
        };

        Ok(Query {
            filter,
            options,
            group,
        })
    }

    /// The `where` predicate, exactly as supplied (empty when absent).
    pub fn filter(&self) -> &Document {
        &self.filter
    }

    /// Every criteria key except `where`, as typed modifiers.
    pub fn options(&self) -> &FindOptions {
        &self.options
    }

    /// Whether the criteria requested an aggregation.
    pub fn is_aggregate(&self) -> bool {
        self.group.is_some()
    }

    /// The group specification of an aggregation request.
    pub fn group(&self) -> Option<&GroupSpec> {
        self.group.as_ref()
    }

    /// The two-stage pipeline for an aggregation request: a match stage from
    /// the `where` predicate (empty predicate when absent) followed by the
    /// group stage. Returns `None` for simple queries.
    pub fn pipeline(&self) -> Option<Vec<PipelineStage>> {
        self.group.as_ref().map(|group| {
            vec![
                PipelineStage::Match(self.filter.clone()),
                PipelineStage::Group(group.clone()),
            ]
        })
    }
}

fn criteria_error(message: &str) -> EstuaryError {
    log::error!("{}", message);
    EstuaryError::new(message, ErrorKind::CriteriaError)
}

fn non_negative(value: &Value, key: &str) -> EstuaryResult<u64> {
    match value.as_i64() {
        Some(count) if count >= 0 => Ok(count as u64),
        _ => Err(criteria_error(&format!(
            "'{}' must be a non-negative integer, found {}",
            key, value
        ))),
    }
}

fn string_list(value: &Value, key: &str) -> EstuaryResult<Vec<String>> {
    let entries = value.as_array().ok_or_else(|| {
        criteria_error(&format!("'{}' must be an array of field names", key))
    })?;

    let mut names = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.as_str() {
            Some(name) => names.push(name.to_string()),
            None => {
                return Err(criteria_error(&format!(
                    "'{}' must be an array of field names, found {} entry",
                    key,
                    entry.type_name()
                )))
            }
        }
    }
    Ok(names)
}

fn parse_sort(value: &Value) -> EstuaryResult<SortFields> {
    let entries = value
        .as_document()
        .ok_or_else(|| criteria_error("'sort' must be a document of field directions"))?;

    let mut sort = SortFields::new();
    for (field, direction) in entries.iter() {
        let order = match direction {
            Value::I32(1) | Value::I64(1) => SortOrder::Ascending,
            Value::I32(-1) | Value::I64(-1) => SortOrder::Descending,
            Value::String(s) if s.eq_ignore_ascii_case("asc") => SortOrder::Ascending,
            Value::String(s) if s.eq_ignore_ascii_case("desc") => SortOrder::Descending,
            other => {
                return Err(criteria_error(&format!(
                    "Sort direction for '{}' must be 1, -1, 'asc' or 'desc', found {}",
                    field, other
                )))
            }
        };
        sort.push((field.clone(), order));
    }
    Ok(sort)
}
