use smallvec::SmallVec;

use crate::common::SortOrder;

pub(crate) type SortFields = SmallVec<[(String, SortOrder); 4]>;

/// Modifiers carried alongside a simple query: everything in a criteria
/// object except the `where` clause.
///
/// Supports method chaining for convenient construction in code and tests.
///
/// # Examples
///
/// ```rust,ignore
/// use estuary::criteria::FindOptions;
/// use estuary::common::SortOrder;
///
/// let options = FindOptions::new()
///     .sort_by("age", SortOrder::Descending)
///     .skip(10)
///     .limit(20);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    pub(crate) sort: SortFields,
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<u64>,
}

/// Creates `FindOptions` sorted by a field.
pub fn order_by(field_name: &str, sort_order: SortOrder) -> FindOptions {
    FindOptions::new().sort_by(field_name, sort_order)
}

/// Creates `FindOptions` that skips a number of results.
pub fn skip_by(skip: u64) -> FindOptions {
    FindOptions::new().skip(skip)
}

/// Creates `FindOptions` that limits the number of results.
pub fn limit_to(limit: u64) -> FindOptions {
    FindOptions::new().limit(limit)
}

impl FindOptions {
    /// Creates a new `FindOptions` with no modifiers set.
    pub fn new() -> FindOptions {
        FindOptions {
            sort: SortFields::new(),
            skip: None,
            limit: None,
        }
    }

    /// Appends a sort field; earlier fields take precedence.
    pub fn sort_by(mut self, field_name: &str, sort_order: SortOrder) -> FindOptions {
        self.sort.push((field_name.to_string(), sort_order));
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: u64) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    pub fn sort_fields(&self) -> &[(String, SortOrder)] {
        &self.sort
    }

    pub fn skip_count(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit_count(&self) -> Option<u64> {
        self.limit
    }
}
