use std::sync::Arc;

use itertools::Itertools;

use crate::common::{Value, DOC_ID};
use crate::connection::{Connection, ConnectionConfig};
use crate::criteria::{flatten_grouped, FindOptions, PipelineStage, Query};
use crate::document::Document;
use crate::driver::Driver;
use crate::errors::{ErrorKind, EstuaryError, EstuaryResult};
use crate::index::{build_index_descriptors, IndexDescriptor};
use crate::normalizer;
use crate::schema::Schema;

/// The raw definition an ORM model registration supplies: the collection
/// identity, the connection URL, and the schema definition document.
#[derive(Clone, Debug)]
pub struct CollectionDefinition {
    pub identity: String,
    pub url: String,
    pub schema: Document,
}

/// A single value document or a batch, as [Collection::insert] accepts both.
pub enum Values {
    One(Document),
    Many(Vec<Document>),
}

impl Values {
    fn into_vec(self) -> Vec<Document> {
        match self {
            Values::One(document) => vec![document],
            Values::Many(documents) => documents,
        }
    }
}

impl From<Document> for Values {
    fn from(document: Document) -> Self {
        Values::One(document)
    }
}

impl From<Vec<Document>> for Values {
    fn from(documents: Vec<Document>) -> Self {
        Values::Many(documents)
    }
}

/// The top-level adapter object for one ORM collection.
///
/// Created once per model registration: the identity is lower-cased and used
/// verbatim as the store's collection name for the lifetime of the instance,
/// the connection URL is parsed to structured parameters, the schema is
/// parsed and validated, and the index descriptors are built — all before
/// any I/O.
///
/// Every operation follows the same shape: translate and shape first
/// (failing fast on malformed input), open one connection, run a short fixed
/// sequence of driver calls, normalize the result, and release the
/// connection on every exit path. Operations share no mutable state, so
/// concurrent calls on one `Collection` are independent.
pub struct Collection {
    identity: String,
    config: ConnectionConfig,
    schema: Schema,
    indexes: Vec<IndexDescriptor>,
    driver: Arc<dyn Driver>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .field("schema", &self.schema)
            .field("indexes", &self.indexes)
            .finish_non_exhaustive()
    }
}

impl Collection {
    /// Parses a definition into a ready collection. No I/O is performed;
    /// use [register](Collection::register) to create the declared indexes
    /// in the store.
    pub fn new(definition: CollectionDefinition, driver: Arc<dyn Driver>) -> EstuaryResult<Collection> {
        let identity = definition.identity.to_lowercase();
        if identity.is_empty() {
            log::error!("Collection identity cannot be empty");
            return Err(EstuaryError::new(
                "Collection identity cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }

        let config = ConnectionConfig::from_url(&definition.url)?;
        let schema = Schema::parse(&definition.schema)?;
        let indexes = build_index_descriptors(&schema);
        log::debug!(
            "Registered collection '{}' with {} index descriptor(s)",
            identity,
            indexes.len()
        );

        Ok(Collection {
            identity,
            config,
            schema,
            indexes,
            driver,
        })
    }

    /// The lower-cased store collection name.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The index-creation instructions built from the schema at
    /// construction.
    pub fn index_descriptors(&self) -> &[IndexDescriptor] {
        &self.indexes
    }

    /// Creates the declared indexes in the store. Called once after model
    /// registration; the data operations do not re-issue index creation.
    pub fn register(&self) -> EstuaryResult<()> {
        let connection = Connection::open(self.driver.as_ref(), &self.config)?;
        {
            let handle = connection.collection(&self.identity)?;
            for descriptor in &self.indexes {
                handle.ensure_index(descriptor)?;
            }
        }
        connection.close()
    }

    /// Finds records matching the criteria.
    ///
    /// Aggregation criteria run the two-stage match/group pipeline and
    /// return one flat record per group; everything else runs a direct
    /// query with the `where` predicate and the remaining modifiers.
    /// Results are normalized to the ORM identifier convention.
    pub fn find(&self, criteria: &Document) -> EstuaryResult<Vec<Document>> {
        let query = Query::parse(criteria)?;
        let filter = normalizer::denormalize_filter(query.filter());

        let connection = Connection::open(self.driver.as_ref(), &self.config)?;
        let results = {
            let handle = connection.collection(&self.identity)?;
            match query.group() {
                Some(group) => {
                    let pipeline = [
                        PipelineStage::Match(filter.clone()),
                        PipelineStage::Group(group.clone()),
                    ];
                    let grouped = handle.aggregate(&pipeline)?;
                    flatten_grouped(grouped)?
                }
                None => {
                    let records = handle.find(&filter, query.options())?;
                    normalizer::normalize_records(records)
                }
            }
        };
        finish(connection);
        Ok(results)
    }

    /// Inserts one value document or a batch.
    ///
    /// Each value is shaped through the schema independently, the whole
    /// batch is persisted in one driver call, and the result is always a
    /// list — one normalized record per input, in input order.
    pub fn insert(&self, values: impl Into<Values>) -> EstuaryResult<Vec<Document>> {
        let values = values.into().into_vec();
        let shaped = normalizer::shape_many(&self.schema, &values)?;

        let connection = Connection::open(self.driver.as_ref(), &self.config)?;
        let stored = {
            let handle = connection.collection(&self.identity)?;
            handle.insert(shaped)?
        };
        finish(connection);
        Ok(normalizer::normalize_records(stored))
    }

    /// Updates every record matching the criteria with the given values.
    ///
    /// Matching records' native identifiers are captured before the write,
    /// so the response reflects exactly the updated set even though the
    /// driver's own update response omits full documents. Matching zero
    /// records is an error, not a silent empty result.
    pub fn update(&self, criteria: &Document, values: &Document) -> EstuaryResult<Vec<Document>> {
        let query = Query::parse(criteria)?;
        if query.is_aggregate() {
            return Err(aggregate_rejected("update"));
        }
        let changes = self.schema.shape(&normalizer::strip_identifier_keys(values))?;
        let filter = normalizer::denormalize_filter(query.filter());

        let connection = Connection::open(self.driver.as_ref(), &self.config)?;
        let updated = {
            let handle = connection.collection(&self.identity)?;

            let matched = handle.find(&filter, &FindOptions::new())?;
            if matched.is_empty() {
                log::error!("Could not find any records to update");
                return Err(EstuaryError::new(
                    "Could not find any records to update",
                    ErrorKind::NoRecordsFound,
                ));
            }
            let ids = matched
                .iter()
                .filter_map(Document::record_id)
                .map(Value::RecordId)
                .collect_vec();

            handle.update(&filter, &changes)?;

            // re-fetch by the captured identifier set
            let mut membership = Document::new();
            membership.put_unchecked("in", Value::Array(ids));
            let mut refetch = Document::new();
            refetch.put_unchecked(DOC_ID, Value::Document(membership));
            handle.find(&refetch, &FindOptions::new())?
        };
        finish(connection);
        Ok(normalizer::normalize_records(updated))
    }

    /// Removes every record matching the criteria.
    ///
    /// The result is a uniform list of `{id}` records — one per removed
    /// document — regardless of whether the driver reported a count, a bare
    /// identifier, or a list.
    pub fn destroy(&self, criteria: &Document) -> EstuaryResult<Vec<Document>> {
        let query = Query::parse(criteria)?;
        if query.is_aggregate() {
            return Err(aggregate_rejected("destroy"));
        }
        let filter = normalizer::denormalize_filter(query.filter());

        let connection = Connection::open(self.driver.as_ref(), &self.config)?;
        let removed = {
            let handle = connection.collection(&self.identity)?;

            let matched = handle.find(&filter, &FindOptions::new())?;
            let captured = matched
                .iter()
                .filter_map(Document::record_id)
                .map(Value::RecordId)
                .collect_vec();

            let outcome = handle.remove(&filter)?;
            normalizer::normalize_removed(outcome, &captured)
        };
        finish(connection);
        Ok(removed)
    }

    /// Counts records matching the criteria without materializing them.
    pub fn count(&self, criteria: &Document) -> EstuaryResult<u64> {
        let query = Query::parse(criteria)?;
        if query.is_aggregate() {
            return Err(aggregate_rejected("count"));
        }
        let filter = normalizer::denormalize_filter(query.filter());

        let connection = Connection::open(self.driver.as_ref(), &self.config)?;
        let count = {
            let handle = connection.collection(&self.identity)?;
            handle.count(&filter)?
        };
        finish(connection);
        Ok(count)
    }

    /// Removes the backing collection from the store.
    pub fn drop_collection(&self) -> EstuaryResult<()> {
        let connection = Connection::open(self.driver.as_ref(), &self.config)?;
        {
            let handle = connection.collection(&self.identity)?;
            handle.drop_collection()?;
        }
        connection.close()
    }
}

/// Success-path release: the operation already has its result, so a close
/// failure is logged rather than clobbering it. Error paths release through
/// the guard's `Drop`.
fn finish(connection: Connection) {
    if let Err(e) = connection.close() {
        log::warn!("Failed to close connection after operation: {}", e);
    }
}

fn aggregate_rejected(operation: &str) -> EstuaryError {
    let message = format!("Aggregation criteria are not valid for {}", operation);
    log::error!("{}", message);
    EstuaryError::new(&message, ErrorKind::InvalidOperation)
}
