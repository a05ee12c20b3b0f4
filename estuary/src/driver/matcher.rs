use std::cmp::Ordering;

use regex::Regex;

use crate::common::Value;
use crate::document::Document;
use crate::errors::{ErrorKind, EstuaryError, EstuaryResult};

const OPERATORS: [&str; 8] = ["gt", "gte", "lt", "lte", "ne", "in", "nin", "like"];

/// Evaluates a `where` predicate against one document.
///
/// An empty predicate matches everything. Entries combine with AND; the
/// top-level `or` key takes an array of sub-predicates combined with OR.
/// A field mapped to an array means membership, a field mapped to an
/// operator sub-document applies comparison operators, and anything else is
/// an equality check.
pub fn matches(filter: &Document, document: &Document) -> EstuaryResult<bool> {
    for (key, expected) in filter.iter() {
        if key == "or" {
            if !matches_any(expected, document)? {
                return Ok(false);
            }
            continue;
        }

        let actual = document.get(key);
        let matched = match expected {
            Value::Document(sub) if is_operator_document(sub) => {
                matches_operators(key, sub, &actual)?
            }
            Value::Array(members) => members.contains(&actual),
            other => actual == *other,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_any(predicates: &Value, document: &Document) -> EstuaryResult<bool> {
    let predicates = predicates.as_array().ok_or_else(|| {
        unsupported("'or' must be an array of predicate documents")
    })?;

    for predicate in predicates {
        let predicate = predicate.as_document().ok_or_else(|| {
            unsupported("'or' must be an array of predicate documents")
        })?;
        if matches(predicate, document)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_operator_document(sub: &Document) -> bool {
    sub.iter().any(|(key, _)| OPERATORS.contains(&key.as_str()))
}

fn matches_operators(field: &str, operators: &Document, actual: &Value) -> EstuaryResult<bool> {
    for (op, operand) in operators.iter() {
        let holds = match op.as_str() {
            "gt" => compare(actual, operand).is_some_and(|o| o == Ordering::Greater),
            "gte" => compare(actual, operand).is_some_and(|o| o != Ordering::Less),
            "lt" => compare(actual, operand).is_some_and(|o| o == Ordering::Less),
            "lte" => compare(actual, operand).is_some_and(|o| o != Ordering::Greater),
            "ne" => actual != operand,
            "in" => member_of(field, operand, actual)?,
            "nin" => !member_of(field, operand, actual)?,
            "like" => matches_like(operand, actual)?,
            other => {
                return Err(unsupported(&format!(
                    "Unsupported filter operator '{}' on field '{}'",
                    other, field
                )))
            }
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Values only compare within the same family — two numbers, two strings,
/// two booleans, or two record identifiers. Everything else is incomparable
/// and fails range operators instead of ordering by variant.
fn compare(actual: &Value, operand: &Value) -> Option<Ordering> {
    let comparable = (actual.is_numeric() && operand.is_numeric())
        || matches!((actual, operand), (Value::String(_), Value::String(_)))
        || matches!((actual, operand), (Value::Bool(_), Value::Bool(_)))
        || matches!((actual, operand), (Value::RecordId(_), Value::RecordId(_)));

    if comparable {
        Some(actual.cmp(operand))
    } else {
        None
    }
}

fn member_of(field: &str, operand: &Value, actual: &Value) -> EstuaryResult<bool> {
    let members = operand.as_array().ok_or_else(|| {
        unsupported(&format!(
            "'in'/'nin' on field '{}' requires an array operand",
            field
        ))
    })?;
    Ok(members.contains(actual))
}

/// Case-insensitive pattern match with `%` as a multi-character wildcard and
/// `_` as a single-character wildcard.
fn matches_like(operand: &Value, actual: &Value) -> EstuaryResult<bool> {
    let pattern = operand
        .as_str()
        .ok_or_else(|| unsupported("'like' requires a string pattern"))?;

    let actual = match actual.as_str() {
        Some(actual) => actual,
        None => return Ok(false),
    };

    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push_str("(?i)^");
    for ch in pattern.chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');

    let pattern = Regex::new(&translated).map_err(|e| {
        EstuaryError::new(
            &format!("Invalid 'like' pattern: {}", e),
            ErrorKind::DriverError,
        )
    })?;
    Ok(pattern.is_match(actual))
}

fn unsupported(message: &str) -> EstuaryError {
    log::error!("{}", message);
    EstuaryError::new(message, ErrorKind::DriverError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(matches(&doc! {}, &doc! { name: "Alice" }).unwrap());
        assert!(matches(&doc! {}, &doc! {}).unwrap());
    }

    #[test]
    fn test_equality() {
        let document = doc! { name: "Alice", age: 30 };
        assert!(matches(&doc! { name: "Alice" }, &document).unwrap());
        assert!(!matches(&doc! { name: "Bob" }, &document).unwrap());
        assert!(matches(&doc! { name: "Alice", age: 30 }, &document).unwrap());
        assert!(!matches(&doc! { name: "Alice", age: 31 }, &document).unwrap());
    }

    #[test]
    fn test_missing_field_only_matches_null() {
        let document = doc! { name: "Alice" };
        assert!(!matches(&doc! { age: 30 }, &document).unwrap());
        assert!(matches(&doc! { age: (Value::Null) }, &document).unwrap());
    }

    #[test]
    fn test_array_value_means_membership() {
        let document = doc! { age: 30 };
        assert!(matches(&doc! { age: [20, 30, 40] }, &document).unwrap());
        assert!(!matches(&doc! { age: [20, 40] }, &document).unwrap());
    }

    #[test]
    fn test_range_operators() {
        let document = doc! { age: 30 };
        assert!(matches(&doc! { age: { gt: 20 } }, &document).unwrap());
        assert!(!matches(&doc! { age: { gt: 30 } }, &document).unwrap());
        assert!(matches(&doc! { age: { gte: 30 } }, &document).unwrap());
        assert!(matches(&doc! { age: { lt: 31 } }, &document).unwrap());
        assert!(matches(&doc! { age: { lte: 30 } }, &document).unwrap());
        assert!(matches(&doc! { age: { gt: 20, lt: 40 } }, &document).unwrap());
        assert!(!matches(&doc! { age: { gt: 20, lt: 25 } }, &document).unwrap());
    }

    #[test]
    fn test_range_operators_compare_across_numeric_widths() {
        let document = doc! { ratio: 2.5 };
        assert!(matches(&doc! { ratio: { gt: 2 } }, &document).unwrap());
        assert!(matches(&doc! { ratio: { lt: 3 } }, &document).unwrap());
    }

    #[test]
    fn test_range_operators_reject_mixed_families() {
        let document = doc! { age: 30 };
        // a string operand never orders against a number
        assert!(!matches(&doc! { age: { gt: "20" } }, &document).unwrap());
    }

    #[test]
    fn test_ne_in_nin() {
        let document = doc! { name: "Alice" };
        assert!(matches(&doc! { name: { ne: "Bob" } }, &document).unwrap());
        assert!(!matches(&doc! { name: { ne: "Alice" } }, &document).unwrap());
        assert!(matches(&doc! { name: { "in": ["Alice", "Bob"] } }, &document).unwrap());
        assert!(matches(&doc! { name: { nin: ["Carol"] } }, &document).unwrap());
        assert!(!matches(&doc! { name: { nin: ["Alice"] } }, &document).unwrap());
    }

    #[test]
    fn test_like_wildcards() {
        let document = doc! { email: "alice@example.com" };
        assert!(matches(&doc! { email: { like: "%@example.com" } }, &document).unwrap());
        assert!(matches(&doc! { email: { like: "ALICE@%" } }, &document).unwrap());
        assert!(matches(&doc! { email: { like: "alic_@example.com" } }, &document).unwrap());
        assert!(!matches(&doc! { email: { like: "%@other.com" } }, &document).unwrap());
        // regex metacharacters in the pattern are literal
        assert!(matches(&doc! { email: { like: "%alice@example.com" } }, &document).unwrap());
        assert!(!matches(&doc! { email: { like: "alice.example@com" } }, &document).unwrap());
    }

    #[test]
    fn test_or_predicates() {
        let document = doc! { name: "Alice", age: 30 };
        let filter = doc! { or: [{ name: "Bob" }, { age: 30 }] };
        assert!(matches(&filter, &document).unwrap());

        let filter = doc! { or: [{ name: "Bob" }, { age: 31 }] };
        assert!(!matches(&filter, &document).unwrap());
    }

    #[test]
    fn test_or_combines_with_other_fields() {
        let document = doc! { name: "Alice", age: 30 };
        let filter = doc! { name: "Alice", or: [{ age: 31 }, { age: 30 }] };
        assert!(matches(&filter, &document).unwrap());

        let filter = doc! { name: "Bob", or: [{ age: 30 }] };
        assert!(!matches(&filter, &document).unwrap());
    }

    #[test]
    fn test_subdocument_equality_without_operators() {
        let mut document = Document::new();
        document.put("address", doc! { city: "NY" }).unwrap();

        assert!(matches(&doc! { address: { city: "NY" } }, &document).unwrap());
        assert!(!matches(&doc! { address: { city: "LA" } }, &document).unwrap());
    }

    #[test]
    fn test_unsupported_operator_is_an_error() {
        let document = doc! { age: 30 };
        let result = matches(&doc! { age: { gt: 20, regex: ".*" } }, &document);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), &ErrorKind::DriverError);
    }

    #[test]
    fn test_in_requires_array_operand() {
        let document = doc! { age: 30 };
        assert!(matches(&doc! { age: { "in": 30 } }, &document).is_err());
    }
}
