use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;

use crate::common::{
    Value, AUTO_INCREMENT_ATTR, INDEX_ATTR, RESERVED_FIELDS, TYPE_ATTR, UNIQUE_ATTR,
};
use crate::document::Document;
use crate::errors::{ErrorKind, EstuaryError, EstuaryResult};

/// The type a schema field declares for its values.
///
/// The set is closed: a definition naming any other type fails at load time
/// instead of being carried along as an opaque string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Json,
    Array,
    Binary,
}

impl FieldType {
    /// Parses a type name from a schema definition.
    pub fn parse(name: &str) -> EstuaryResult<FieldType> {
        match name.to_lowercase().as_str() {
            "string" => Ok(FieldType::String),
            "text" => Ok(FieldType::Text),
            "integer" => Ok(FieldType::Integer),
            "float" => Ok(FieldType::Float),
            "boolean" => Ok(FieldType::Boolean),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::Datetime),
            "json" => Ok(FieldType::Json),
            "array" => Ok(FieldType::Array),
            "binary" => Ok(FieldType::Binary),
            other => {
                log::error!("Unknown field type '{}'", other);
                Err(EstuaryError::new(
                    &format!("Unknown field type '{}'", other),
                    ErrorKind::SchemaError,
                ))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Json => "json",
            FieldType::Array => "array",
            FieldType::Binary => "binary",
        }
    }
}

/// A single field declaration: its type plus the semantic flags the adapter
/// acts on.
///
/// `autoIncrement` is accepted for compatibility with ORM definitions but is
/// inert — the target store cannot support it, so the flag is stripped before
/// index construction and value shaping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    field_type: FieldType,
    unique: bool,
    index: bool,
    auto_increment: bool,
}

impl FieldSpec {
    fn parse(field_name: &str, definition: &Value) -> EstuaryResult<FieldSpec> {
        match definition {
            // shorthand: field name mapped straight to a type name
            Value::String(type_name) => Ok(FieldSpec {
                field_type: FieldType::parse(type_name)?,
                unique: false,
                index: false,
                auto_increment: false,
            }),
            Value::Document(attributes) => {
                let mut field_type = None;
                let mut unique = false;
                let mut index = false;
                let mut auto_increment = false;

                for (attr, value) in attributes.iter() {
                    match attr.as_str() {
                        TYPE_ATTR => {
                            let name = value.as_str().ok_or_else(|| {
                                schema_error(&format!(
                                    "Field '{}' declares a non-string type",
                                    field_name
                                ))
                            })?;
                            field_type = Some(FieldType::parse(name)?);
                        }
                        UNIQUE_ATTR => unique = bool_attr(field_name, attr, value)?,
                        INDEX_ATTR => index = bool_attr(field_name, attr, value)?,
                        AUTO_INCREMENT_ATTR => {
                            auto_increment = bool_attr(field_name, attr, value)?;
                            if auto_increment {
                                log::warn!(
                                    "Field '{}' declares autoIncrement, which the store does not support; the flag is stripped",
                                    field_name
                                );
                            }
                        }
                        other => {
                            log::error!("Field '{}' has unknown attribute '{}'", field_name, other);
                            return Err(schema_error(&format!(
                                "Field '{}' has unknown attribute '{}'",
                                field_name, other
                            )));
                        }
                    }
                }

                let field_type = field_type.ok_or_else(|| {
                    schema_error(&format!("Field '{}' is missing a type", field_name))
                })?;

                Ok(FieldSpec {
                    field_type,
                    unique,
                    index,
                    auto_increment,
                })
            }
            other => Err(schema_error(&format!(
                "Field '{}' must be declared as a type name or an attribute document, found {}",
                field_name,
                other.type_name()
            ))),
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_indexed(&self) -> bool {
        self.index
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }
}

fn bool_attr(field_name: &str, attr: &str, value: &Value) -> EstuaryResult<bool> {
    value.as_bool().ok_or_else(|| {
        schema_error(&format!(
            "Field '{}' attribute '{}' must be a boolean",
            field_name, attr
        ))
    })
}

fn schema_error(message: &str) -> EstuaryError {
    log::error!("{}", message);
    EstuaryError::new(message, ErrorKind::SchemaError)
}

/// A parsed collection schema: an ordered mapping from field name to
/// [FieldSpec].
///
/// Parsed once at collection construction and immutable afterwards. Shaping
/// a value document through the schema keeps only declared fields and
/// coerces each value to its declared type.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    fields: IndexMap<String, FieldSpec>,
}

impl Schema {
    /// Parses a schema definition document.
    ///
    /// # Errors
    ///
    /// Fails with [ErrorKind::SchemaError] on unknown types, unknown field
    /// attributes, non-boolean flags, or a field that shadows the reserved
    /// `_id` identifier.
    pub fn parse(definition: &Document) -> EstuaryResult<Schema> {
        let mut fields = IndexMap::new();
        for (field_name, spec) in definition.iter() {
            if RESERVED_FIELDS.contains(&field_name.as_str()) {
                return Err(schema_error(&format!(
                    "Field name '{}' is reserved for the store identifier",
                    field_name
                )));
            }
            fields.insert(field_name.clone(), FieldSpec::parse(field_name, spec)?);
        }
        Ok(Schema { fields })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Iterates over the declared fields in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.fields.iter()
    }

    /// Shapes a value document for storage.
    ///
    /// Declared fields are coerced to their declared type; fields the schema
    /// does not know are dropped with a warning. [Value::Null] passes through
    /// for any field type, since absence is always representable.
    pub fn shape(&self, values: &Document) -> EstuaryResult<Document> {
        let mut shaped = Document::new();
        for (field_name, value) in values.iter() {
            match self.fields.get(field_name) {
                Some(spec) => {
                    let coerced = coerce(field_name, value, spec.field_type())?;
                    shaped.put(field_name, coerced)?;
                }
                None => {
                    log::warn!("Dropping undeclared field '{}' from value document", field_name);
                }
            }
        }
        Ok(shaped)
    }
}

/// Coerces a single value to its declared field type.
///
/// Integer widths are unified to [Value::I64]; integers widen losslessly to
/// floats for `float` fields, and whole-valued floats narrow to integers for
/// `integer` fields. Date and datetime strings are validated with chrono and
/// re-emitted in canonical form.
fn coerce(field_name: &str, value: &Value, field_type: FieldType) -> EstuaryResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let mismatch = || {
        let message = format!(
            "Field '{}' expects {} but got {}",
            field_name,
            field_type.name(),
            value.type_name()
        );
        log::error!("{}", message);
        EstuaryError::new(&message, ErrorKind::ValidationError)
    };

    match field_type {
        FieldType::String | FieldType::Text => match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
        FieldType::Integer => match value {
            Value::I32(i) => Ok(Value::I64(*i as i64)),
            Value::I64(_) => Ok(value.clone()),
            Value::F64(f) if f.fract() == 0.0 => Ok(Value::I64(*f as i64)),
            _ => Err(mismatch()),
        },
        FieldType::Float => match value {
            Value::F64(_) => Ok(value.clone()),
            Value::I32(i) => Ok(Value::F64(*i as f64)),
            Value::I64(i) => Ok(Value::F64(*i as f64)),
            _ => Err(mismatch()),
        },
        FieldType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
        FieldType::Date => match value {
            Value::String(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(date) => Ok(Value::String(date.format("%Y-%m-%d").to_string())),
                Err(_) => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        FieldType::Datetime => match value {
            Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(datetime) => Ok(Value::String(datetime.to_rfc3339())),
                Err(_) => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        FieldType::Json => Ok(value.clone()),
        FieldType::Array => match value {
            Value::Array(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
        FieldType::Binary => match value {
            Value::Bytes(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
    }
}
