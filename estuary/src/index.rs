use crate::common::{SortOrder, NON_UNIQUE_INDEX, UNIQUE_INDEX};
use crate::schema::Schema;

/// Options attached to an index-creation instruction.
///
/// Unique indexes are created sparse so that documents missing the field do
/// not collide on the absent value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexOptions {
    unique: bool,
    sparse: bool,
}

impl IndexOptions {
    pub fn unique() -> IndexOptions {
        IndexOptions {
            unique: true,
            sparse: true,
        }
    }

    pub fn non_unique() -> IndexOptions {
        IndexOptions {
            unique: false,
            sparse: false,
        }
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse
    }

    pub fn index_type(&self) -> &'static str {
        if self.unique {
            UNIQUE_INDEX
        } else {
            NON_UNIQUE_INDEX
        }
    }
}

/// Describes one index-creation instruction for a collection.
///
/// One descriptor is produced per schema field flagged `unique` or `index`.
/// Descriptors are built once at collection construction and immutable
/// afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexDescriptor {
    field: String,
    order: SortOrder,
    options: IndexOptions,
}

impl IndexDescriptor {
    pub fn new(field: &str, order: SortOrder, options: IndexOptions) -> IndexDescriptor {
        IndexDescriptor {
            field: field.to_string(),
            order,
            options,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }
}

/// Walks a parsed schema and produces the index-creation instructions for
/// every field flagged `unique` or `index`, in definition order.
///
/// `unique` wins when both flags are set; `autoIncrement` never contributes
/// an index because the flag is stripped at schema load.
pub fn build_index_descriptors(schema: &Schema) -> Vec<IndexDescriptor> {
    let mut descriptors = Vec::new();
    for (field_name, spec) in schema.iter() {
        if spec.is_unique() {
            descriptors.push(IndexDescriptor::new(
                field_name,
                SortOrder::Ascending,
                IndexOptions::unique(),
            ));
        } else if spec.is_indexed() {
            descriptors.push(IndexDescriptor::new(
                field_name,
                SortOrder::Ascending,
                IndexOptions::non_unique(),
            ));
        }
    }
    descriptors
}
