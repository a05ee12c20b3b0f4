//! The seam between the adapter and the native document store.
//!
//! The adapter consumes these traits as black boxes: a [Driver] opens
//! connections, a [DriverConnection] hands out collection handles and
//! closes, and a [DriverCollection] exposes the store's native operations.
//! The [MemoryDriver] in this module is the in-process reference
//! implementation used by the test suite and by embedders that do not need
//! an external store.

mod matcher;
mod memory;

pub use matcher::matches;
pub use memory::*;

use crate::common::Value;
use crate::connection::ConnectionConfig;
use crate::criteria::{FindOptions, PipelineStage};
use crate::document::Document;
use crate::errors::EstuaryResult;
use crate::index::IndexDescriptor;

/// Opens connections to a document store.
pub trait Driver: Send + Sync {
    fn connect(&self, config: &ConnectionConfig) -> EstuaryResult<Box<dyn DriverConnection>>;
}

/// An open connection to one database of the store.
pub trait DriverConnection: Send {
    /// Returns a handle to a named collection, creating it if the store
    /// creates collections lazily.
    fn collection(&self, name: &str) -> EstuaryResult<Box<dyn DriverCollection + '_>>;

    /// Closes the connection. After closing, handles obtained from this
    /// connection report [ErrorKind::ConnectionError](crate::errors::ErrorKind).
    fn close(self: Box<Self>) -> EstuaryResult<()>;
}

/// The native operations of one collection.
pub trait DriverCollection {
    fn find(&self, filter: &Document, options: &FindOptions) -> EstuaryResult<Vec<Document>>;

    /// Persists a batch of documents, assigning each a record identifier.
    /// Returns the stored documents, in input order, with their `_id` set.
    fn insert(&self, documents: Vec<Document>) -> EstuaryResult<Vec<Document>>;

    /// Applies the change document to every match. Returns the number of
    /// documents updated.
    fn update(&self, filter: &Document, changes: &Document) -> EstuaryResult<u64>;

    /// Removes every match and reports the outcome in whichever shape the
    /// store produces.
    fn remove(&self, filter: &Document) -> EstuaryResult<RemovalOutcome>;

    /// Runs an aggregation pipeline and returns the grouped records, each
    /// carrying its synthetic `_id`.
    fn aggregate(&self, pipeline: &[PipelineStage]) -> EstuaryResult<Vec<Document>>;

    /// Counts matches without materializing them.
    fn count(&self, filter: &Document) -> EstuaryResult<u64>;

    /// Creates the described index if it does not already exist.
    fn ensure_index(&self, descriptor: &IndexDescriptor) -> EstuaryResult<()>;

    /// Removes the backing collection from the store.
    fn drop_collection(&self) -> EstuaryResult<()>;
}

/// The shape a store reports a removal in. Different stores (and different
/// driver versions) report a plain count, the identifier of a single removed
/// document, or the full identifier list; the normalizer collapses all three
/// into a uniform `{id}` record list.
#[derive(Clone, Debug, PartialEq)]
pub enum RemovalOutcome {
    Count(u64),
    Removed(Value),
    RemovedMany(Vec<Value>),
}
