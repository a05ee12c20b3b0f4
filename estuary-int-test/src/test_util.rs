use std::sync::Arc;

use estuary::collection::{Collection, CollectionDefinition};
use estuary::document::Document;
use estuary::driver::MemoryDriver;

/// Shared state for one integration test: a private in-memory store and a
/// database name no other test touches.
pub struct TestContext {
    driver: Arc<MemoryDriver>,
    database: String,
}

impl TestContext {
    pub fn new() -> TestContext {
        TestContext {
            driver: Arc::new(MemoryDriver::new()),
            database: format!("test_{}", uuid::Uuid::new_v4().simple()),
        }
    }

    /// Builds and registers a collection against this context's store.
    pub fn collection(&self, identity: &str, schema: Document) -> Collection {
        let collection = Collection::new(
            CollectionDefinition {
                identity: identity.to_string(),
                url: format!("estuary://localhost/{}", self.database),
                schema,
            },
            self.driver.clone(),
        )
        .expect("collection definition should parse");
        collection.register().expect("index registration should succeed");
        collection
    }
}

impl Default for TestContext {
    fn default() -> Self {
        TestContext::new()
    }
}
