use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use im::OrdMap;

use crate::common::{
    atomic, Atomic, ReadExecutor, RecordId, SortOrder, Value, WriteExecutor, DOC_ID,
};
use crate::connection::ConnectionConfig;
use crate::criteria::{Accumulator, AccumulatorOp, FindOptions, GroupSpec, PipelineStage};
use crate::document::Document;
use crate::driver::{matches, Driver, DriverCollection, DriverConnection, RemovalOutcome};
use crate::errors::{ErrorKind, EstuaryError, EstuaryResult};
use crate::index::IndexDescriptor;

/// An in-process document store implementing the driver seam.
///
/// Databases and collections are created lazily on first access and live for
/// the lifetime of the driver. Host, port and credentials in the connection
/// configuration are accepted and ignored; only the database name selects
/// state. Collections use persistent ordered maps, so writes stage a new map
/// and swap it in only when the whole batch validates — a failed batch
/// leaves the collection untouched.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    databases: Arc<DashMap<String, MemoryDatabase>>,
}

impl MemoryDriver {
    pub fn new() -> MemoryDriver {
        MemoryDriver {
            databases: Arc::new(DashMap::new()),
        }
    }
}

impl Driver for MemoryDriver {
    fn connect(&self, config: &ConnectionConfig) -> EstuaryResult<Box<dyn DriverConnection>> {
        log::debug!("Opening in-memory connection to database '{}'", config.database());
        let database = self
            .databases
            .entry(config.database().to_string())
            .or_insert_with(MemoryDatabase::new)
            .value()
            .clone();
        Ok(Box::new(MemoryConnection {
            database,
            open: Arc::new(AtomicBool::new(true)),
        }))
    }
}

#[derive(Clone, Default)]
struct MemoryDatabase {
    collections: Arc<DashMap<String, MemoryCollection>>,
}

impl MemoryDatabase {
    fn new() -> MemoryDatabase {
        MemoryDatabase {
            collections: Arc::new(DashMap::new()),
        }
    }
}

#[derive(Clone)]
struct MemoryCollection {
    documents: Atomic<OrdMap<RecordId, Document>>,
    indexes: Atomic<Vec<IndexDescriptor>>,
}

impl MemoryCollection {
    fn new() -> MemoryCollection {
        MemoryCollection {
            documents: atomic(OrdMap::new()),
            indexes: atomic(Vec::new()),
        }
    }
}

struct MemoryConnection {
    database: MemoryDatabase,
    open: Arc<AtomicBool>,
}

impl MemoryConnection {
    fn ensure_open(&self) -> EstuaryResult<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(closed_error());
        }
        Ok(())
    }
}

impl DriverConnection for MemoryConnection {
    fn collection(&self, name: &str) -> EstuaryResult<Box<dyn DriverCollection + '_>> {
        self.ensure_open()?;
        let collection = self
            .database
            .collections
            .entry(name.to_string())
            .or_insert_with(MemoryCollection::new)
            .value()
            .clone();
        Ok(Box::new(MemoryCollectionHandle {
            name: name.to_string(),
            database: self.database.clone(),
            collection,
            open: self.open.clone(),
        }))
    }

    fn close(self: Box<Self>) -> EstuaryResult<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }
}

struct MemoryCollectionHandle {
    name: String,
    database: MemoryDatabase,
    collection: MemoryCollection,
    open: Arc<AtomicBool>,
}

impl MemoryCollectionHandle {
    fn ensure_open(&self) -> EstuaryResult<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(closed_error());
        }
        Ok(())
    }
}

fn closed_error() -> EstuaryError {
    log::error!("Connection is closed; no further operations are possible");
    EstuaryError::new("Connection is closed", ErrorKind::ConnectionError)
}

impl DriverCollection for MemoryCollectionHandle {
    fn find(&self, filter: &Document, options: &FindOptions) -> EstuaryResult<Vec<Document>> {
        self.ensure_open()?;
        let snapshot = self.collection.documents.read_with(|map| map.clone());

        let mut matched = Vec::new();
        for document in snapshot.values() {
            if matches(filter, document)? {
                matched.push(document.clone());
            }
        }

        if !options.sort_fields().is_empty() {
            matched.sort_by(|a, b| {
                for (field, order) in options.sort_fields() {
                    let ordering = a.get(field).cmp(&b.get(field));
                    let ordering = match order {
                        SortOrder::Ascending => ordering,
                        SortOrder::Descending => ordering.reverse(),
                    };
                    if ordering != std::cmp::Ordering::Equal {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        let skip = options.skip_count().unwrap_or(0) as usize;
        let results: Vec<Document> = match options.limit_count() {
            Some(limit) => matched.into_iter().skip(skip).take(limit as usize).collect(),
            None => matched.into_iter().skip(skip).collect(),
        };
        Ok(results)
    }

    fn insert(&self, documents: Vec<Document>) -> EstuaryResult<Vec<Document>> {
        self.ensure_open()?;
        let indexes = self.collection.indexes.read_with(|indexes| indexes.clone());

        self.collection.documents.write_with(|map| {
            let mut staged = map.clone();
            let mut stored = Vec::with_capacity(documents.len());

            for document in documents {
                let mut document = document;
                let id = RecordId::new();
                document.put(DOC_ID, id.clone())?;
                check_unique(&staged, &indexes, &document, None)?;
                staged.insert(id, document.clone());
                stored.push(document);
            }

            *map = staged;
            Ok(stored)
        })
    }

    fn update(&self, filter: &Document, changes: &Document) -> EstuaryResult<u64> {
        self.ensure_open()?;
        let indexes = self.collection.indexes.read_with(|indexes| indexes.clone());

        self.collection.documents.write_with(|map| {
            let mut matched_ids = Vec::new();
            for (id, document) in map.iter() {
                if matches(filter, document)? {
                    matched_ids.push(id.clone());
                }
            }

            let mut staged = map.clone();
            for id in &matched_ids {
                if let Some(existing) = staged.get(id) {
                    let mut updated = existing.clone();
                    for (field, value) in changes.iter() {
                        // identifiers are immutable
                        if field != DOC_ID {
                            updated.put_unchecked(field, value.clone());
                        }
                    }
                    check_unique(&staged, &indexes, &updated, Some(id))?;
                    staged.insert(id.clone(), updated);
                }
            }

            *map = staged;
            Ok(matched_ids.len() as u64)
        })
    }

    fn remove(&self, filter: &Document) -> EstuaryResult<RemovalOutcome> {
        self.ensure_open()?;

        self.collection.documents.write_with(|map| {
            let mut removed_ids = Vec::new();
            for (id, document) in map.iter() {
                if matches(filter, document)? {
                    removed_ids.push(id.clone());
                }
            }

            let mut staged = map.clone();
            for id in &removed_ids {
                staged.remove(id);
            }
            *map = staged;

            Ok(RemovalOutcome::RemovedMany(
                removed_ids.into_iter().map(Value::RecordId).collect(),
            ))
        })
    }

    fn aggregate(&self, pipeline: &[PipelineStage]) -> EstuaryResult<Vec<Document>> {
        self.ensure_open()?;
        let snapshot = self.collection.documents.read_with(|map| map.clone());

        let mut current: Vec<Document> = snapshot.values().cloned().collect();
        for stage in pipeline {
            current = match stage {
                PipelineStage::Match(filter) => {
                    let mut matched = Vec::new();
                    for document in current {
                        if matches(filter, &document)? {
                            matched.push(document);
                        }
                    }
                    matched
                }
                PipelineStage::Group(spec) => run_group(current, spec),
            };
        }
        Ok(current)
    }

    fn count(&self, filter: &Document) -> EstuaryResult<u64> {
        self.ensure_open()?;
        let snapshot = self.collection.documents.read_with(|map| map.clone());

        let mut count = 0u64;
        for document in snapshot.values() {
            if matches(filter, document)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn ensure_index(&self, descriptor: &IndexDescriptor) -> EstuaryResult<()> {
        self.ensure_open()?;
        self.collection.indexes.write_with(|indexes| {
            if !indexes.iter().any(|existing| existing.field() == descriptor.field()) {
                log::debug!(
                    "Creating {} index on field '{}' of collection '{}'",
                    descriptor.options().index_type(),
                    descriptor.field(),
                    self.name
                );
                indexes.push(descriptor.clone());
            }
        });
        Ok(())
    }

    fn drop_collection(&self) -> EstuaryResult<()> {
        self.ensure_open()?;
        self.database.collections.remove(&self.name);
        self.collection.documents.write_with(|map| *map = OrdMap::new());
        self.collection.indexes.write_with(|indexes| indexes.clear());
        Ok(())
    }
}

/// Rejects a candidate document that collides with an existing one on any
/// unique index. Sparse indexes skip absent values.
fn check_unique(
    map: &OrdMap<RecordId, Document>,
    indexes: &[IndexDescriptor],
    candidate: &Document,
    own_id: Option<&RecordId>,
) -> EstuaryResult<()> {
    for descriptor in indexes.iter().filter(|d| d.options().is_unique()) {
        let value = candidate.get(descriptor.field());
        if value.is_null() && descriptor.options().is_sparse() {
            continue;
        }

        for (id, existing) in map.iter() {
            if own_id == Some(id) {
                continue;
            }
            if existing.get(descriptor.field()) == value {
                let message = format!(
                    "Unique constraint violated for field '{}'",
                    descriptor.field()
                );
                log::error!("{}", message);
                return Err(EstuaryError::new(
                    &message,
                    ErrorKind::UniqueConstraintViolation,
                ));
            }
        }
    }
    Ok(())
}

/// Executes a group stage: partitions documents by the grouped field values
/// and computes each accumulator per partition. Each result record carries
/// the synthetic `_id` the flattening step later folds away.
fn run_group(documents: Vec<Document>, spec: &GroupSpec) -> Vec<Document> {
    let mut groups: Vec<(Vec<Value>, Vec<Document>)> = Vec::new();
    for document in documents {
        let key: Vec<Value> = spec.keys().iter().map(|field| document.get(field)).collect();
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(document),
            None => groups.push((key, vec![document])),
        }
    }

    let mut results = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let mut record = Document::new();

        let synthetic = if spec.keys().is_empty() {
            Value::Null
        } else {
            let mut grouped = Document::new();
            for (field, value) in spec.keys().iter().zip(key) {
                grouped.put_unchecked(field, value);
            }
            Value::Document(grouped)
        };
        record.put_unchecked(DOC_ID, synthetic);

        for accumulator in spec.accumulators() {
            record.put_unchecked(accumulator.field(), accumulate(accumulator, &members));
        }
        results.push(record);
    }
    results
}

fn accumulate(accumulator: &Accumulator, members: &[Document]) -> Value {
    let values: Vec<Value> = members
        .iter()
        .map(|member| member.get(accumulator.field()))
        .filter(|value| !value.is_null())
        .collect();

    match accumulator.op() {
        AccumulatorOp::Sum => {
            let all_integer = values.iter().all(|value| value.as_i64().is_some());
            if all_integer {
                Value::I64(values.iter().filter_map(Value::as_i64).sum())
            } else {
                Value::F64(values.iter().filter_map(Value::as_f64).sum())
            }
        }
        AccumulatorOp::Average => {
            let numeric: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
            if numeric.is_empty() {
                Value::Null
            } else {
                Value::F64(numeric.iter().sum::<f64>() / numeric.len() as f64)
            }
        }
        AccumulatorOp::Min => values.into_iter().min().unwrap_or(Value::Null),
        AccumulatorOp::Max => values.into_iter().max().unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SortOrder;
    use crate::criteria::{order_by, Query};
    use crate::doc;
    use crate::index::IndexOptions;

    #[ctor::ctor]
    fn init() {
        colog::init();
    }

    fn open_handle(driver: &MemoryDriver, database: &str) -> Box<dyn DriverConnection> {
        let config = ConnectionConfig::new("localhost", 7531, database);
        driver.connect(&config).unwrap()
    }

    #[test]
    fn test_insert_assigns_identifiers_in_order() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("users").unwrap();

        let stored = handle
            .insert(vec![doc! { name: "a" }, doc! { name: "b" }])
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].get("name"), Value::String("a".to_string()));
        assert_eq!(stored[1].get("name"), Value::String("b".to_string()));
        assert!(stored[0].record_id().is_some());
        assert!(stored[1].record_id().is_some());
        assert_ne!(stored[0].record_id(), stored[1].record_id());
    }

    #[test]
    fn test_find_with_filter_sort_skip_limit() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("users").unwrap();
        handle
            .insert(vec![
                doc! { name: "a", age: 30 },
                doc! { name: "b", age: 20 },
                doc! { name: "c", age: 40 },
                doc! { name: "d", age: 10 },
            ])
            .unwrap();

        let results = handle
            .find(
                &doc! { age: { gt: 10 } },
                &order_by("age", SortOrder::Descending),
            )
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].get("name"), Value::String("c".to_string()));
        assert_eq!(results[2].get("name"), Value::String("b".to_string()));

        let paged = handle
            .find(
                &doc! {},
                &order_by("age", SortOrder::Ascending).skip(1).limit(2),
            )
            .unwrap();
        assert_eq!(paged.len(), 2);
        assert_eq!(paged[0].get("age"), Value::I32(20));
        assert_eq!(paged[1].get("age"), Value::I32(30));
    }

    #[test]
    fn test_update_applies_changes_and_reports_count() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("users").unwrap();
        handle
            .insert(vec![doc! { name: "a", active: false }, doc! { name: "b", active: false }])
            .unwrap();

        let updated = handle
            .update(&doc! { active: false }, &doc! { active: true })
            .unwrap();
        assert_eq!(updated, 2);

        let results = handle.find(&doc! { active: true }, &FindOptions::new()).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_update_preserves_identifier() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("users").unwrap();
        let stored = handle.insert(vec![doc! { name: "a" }]).unwrap();
        let id = stored[0].record_id().unwrap();

        handle.update(&doc! { name: "a" }, &doc! { name: "z" }).unwrap();

        let results = handle.find(&doc! { name: "z" }, &FindOptions::new()).unwrap();
        assert_eq!(results[0].record_id(), Some(id));
    }

    #[test]
    fn test_remove_reports_removed_identifiers() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("users").unwrap();
        handle
            .insert(vec![doc! { name: "a" }, doc! { name: "b" }, doc! { name: "keep" }])
            .unwrap();

        let outcome = handle.remove(&doc! { name: { "in": ["a", "b"] } }).unwrap();
        match outcome {
            RemovalOutcome::RemovedMany(ids) => assert_eq!(ids.len(), 2),
            other => panic!("expected RemovedMany, got {:?}", other),
        }

        let remaining = handle.find(&doc! {}, &FindOptions::new()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].get("name"), Value::String("keep".to_string()));
    }

    #[test]
    fn test_count() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("users").unwrap();
        handle
            .insert(vec![doc! { age: 10 }, doc! { age: 20 }, doc! { age: 30 }])
            .unwrap();

        assert_eq!(handle.count(&doc! {}).unwrap(), 3);
        assert_eq!(handle.count(&doc! { age: { gte: 20 } }).unwrap(), 2);
    }

    #[test]
    fn test_unique_index_rejects_duplicate_insert() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("users").unwrap();
        handle
            .ensure_index(&IndexDescriptor::new(
                "email",
                SortOrder::Ascending,
                IndexOptions::unique(),
            ))
            .unwrap();

        handle.insert(vec![doc! { email: "a@x.com" }]).unwrap();
        let result = handle.insert(vec![doc! { email: "a@x.com" }]);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            &ErrorKind::UniqueConstraintViolation
        );
    }

    #[test]
    fn test_unique_index_failed_batch_leaves_collection_untouched() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("users").unwrap();
        handle
            .ensure_index(&IndexDescriptor::new(
                "email",
                SortOrder::Ascending,
                IndexOptions::unique(),
            ))
            .unwrap();

        let result = handle.insert(vec![
            doc! { email: "a@x.com" },
            doc! { email: "a@x.com" },
        ]);
        assert!(result.is_err());
        assert_eq!(handle.count(&doc! {}).unwrap(), 0);
    }

    #[test]
    fn test_sparse_unique_index_allows_missing_values() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("users").unwrap();
        handle
            .ensure_index(&IndexDescriptor::new(
                "email",
                SortOrder::Ascending,
                IndexOptions::unique(),
            ))
            .unwrap();

        handle.insert(vec![doc! { name: "a" }]).unwrap();
        handle.insert(vec![doc! { name: "b" }]).unwrap();
        assert_eq!(handle.count(&doc! {}).unwrap(), 2);
    }

    #[test]
    fn test_unique_index_rejects_duplicate_update() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("users").unwrap();
        handle
            .ensure_index(&IndexDescriptor::new(
                "email",
                SortOrder::Ascending,
                IndexOptions::unique(),
            ))
            .unwrap();
        handle
            .insert(vec![doc! { email: "a@x.com" }, doc! { email: "b@x.com" }])
            .unwrap();

        let result = handle.update(&doc! { email: "b@x.com" }, &doc! { email: "a@x.com" });
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            &ErrorKind::UniqueConstraintViolation
        );
    }

    #[test]
    fn test_aggregate_groups_under_synthetic_identifier() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("cities").unwrap();
        handle
            .insert(vec![
                doc! { state: "NY", population: 100 },
                doc! { state: "NY", population: 50 },
                doc! { state: "CA", population: 80 },
            ])
            .unwrap();

        let query = Query::parse(&doc! { groupBy: ["state"], sum: ["population"] }).unwrap();
        let grouped = handle.aggregate(&query.pipeline().unwrap()).unwrap();

        assert_eq!(grouped.len(), 2);
        for record in &grouped {
            let synthetic = record.get(DOC_ID);
            let synthetic = synthetic.as_document().unwrap();
            match synthetic.get("state").as_str().unwrap() {
                "NY" => assert_eq!(record.get("population"), Value::I64(150)),
                "CA" => assert_eq!(record.get("population"), Value::I64(80)),
                other => panic!("unexpected group {}", other),
            }
        }
    }

    #[test]
    fn test_aggregate_match_stage_applies_before_grouping() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("cities").unwrap();
        handle
            .insert(vec![
                doc! { state: "NY", population: 100 },
                doc! { state: "CA", population: 80 },
            ])
            .unwrap();

        let query = Query::parse(&doc! {
            "where": { state: "NY" },
            groupBy: ["state"],
            sum: ["population"]
        })
        .unwrap();
        let grouped = handle.aggregate(&query.pipeline().unwrap()).unwrap();
        assert_eq!(grouped.len(), 1);
    }

    #[test]
    fn test_aggregate_global_group_and_accumulators() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("readings").unwrap();
        handle
            .insert(vec![
                doc! { value: 10 },
                doc! { value: 20 },
                doc! { value: 1.5 },
            ])
            .unwrap();

        let query = Query::parse(&doc! {
            sum: ["value"],
            average: ["value"],
            min: ["value"],
            max: ["value"]
        })
        .unwrap();
        let grouped = handle.aggregate(&query.pipeline().unwrap()).unwrap();

        assert_eq!(grouped.len(), 1);
        let record = &grouped[0];
        assert_eq!(record.get(DOC_ID), Value::Null);
        assert_eq!(record.get("value"), Value::F64(31.5));
    }

    #[test]
    fn test_aggregate_sum_of_integers_stays_integral() {
        let driver = MemoryDriver::new();
        let connection = open_handle(&driver, "test");
        let handle = connection.collection("readings").unwrap();
        handle.insert(vec![doc! { value: 10 }, doc! { value: 20 }]).unwrap();

        let query = Query::parse(&doc! { sum: ["value"] }).unwrap();
        let grouped = handle.aggregate(&query.pipeline().unwrap()).unwrap();
        assert_eq!(grouped[0].get("value"), Value::I64(30));
    }

    #[test]
    fn test_closed_connection_rejects_operations() {
        let driver = MemoryDriver::new();
        let config = ConnectionConfig::new("localhost", 7531, "test");
        let connection = driver.connect(&config).unwrap();
        let handle = connection.collection("users").unwrap();
        handle.insert(vec![doc! { name: "a" }]).unwrap();
        drop(handle);

        // a second connection sees the data after the first closes
        connection.close().unwrap();

        let connection = driver.connect(&config).unwrap();
        let handle = connection.collection("users").unwrap();
        assert_eq!(handle.count(&doc! {}).unwrap(), 1);
    }

    #[test]
    fn test_drop_collection_removes_state() {
        let driver = MemoryDriver::new();
        let config = ConnectionConfig::new("localhost", 7531, "test");
        let connection = driver.connect(&config).unwrap();
        let handle = connection.collection("users").unwrap();
        handle.insert(vec![doc! { name: "a" }]).unwrap();
        handle.drop_collection().unwrap();
        drop(handle);
        connection.close().unwrap();

        let connection = driver.connect(&config).unwrap();
        let handle = connection.collection("users").unwrap();
        assert_eq!(handle.count(&doc! {}).unwrap(), 0);
    }

    #[test]
    fn test_databases_are_isolated() {
        let driver = MemoryDriver::new();

        let first = open_handle(&driver, "one");
        first.collection("users").unwrap().insert(vec![doc! { name: "a" }]).unwrap();

        let second = open_handle(&driver, "two");
        assert_eq!(second.collection("users").unwrap().count(&doc! {}).unwrap(), 0);
    }
}
