//! # Estuary - ORM Adapter for Document Stores
//!
//! Estuary is a thin translation layer that maps a generic ORM's
//! conventions — criteria objects, CRUD verbs, schema definitions with
//! unique/index flags — onto a document store's native driver API.
//!
//! ## Key Features
//!
//! - **Criteria translation**: `where` predicates plus modifiers become
//!   native queries; group-by requests become a two-stage match/group
//!   pipeline with flattened results
//! - **Schema-driven shaping**: declarative field definitions validated at
//!   load time, values coerced per field type before storage
//! - **Index building**: one index-creation instruction per field flagged
//!   `unique` or `index`, built once at collection construction
//! - **Identifier normalization**: the store's `_id` and the ORM's `id`
//!   are rewritten in both directions, for single records and lists
//! - **Connection-per-operation**: every operation opens one scoped
//!   connection and releases it on every exit path
//! - **Pluggable driver seam**: the store is consumed through traits; an
//!   in-memory reference driver ships in-tree
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use estuary::collection::{Collection, CollectionDefinition};
//! use estuary::driver::MemoryDriver;
//! use estuary::doc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let collection = Collection::new(
//!     CollectionDefinition {
//!         identity: "users".to_string(),
//!         url: "estuary://localhost/app".to_string(),
//!         schema: doc! {
//!             name: "string",
//!             email: { "type": "string", unique: true },
//!         },
//!     },
//!     Arc::new(MemoryDriver::new()),
//! )?;
//! collection.register()?;
//!
//! let records = collection.insert(doc! { name: "Alice", email: "alice@example.com" })?;
//! let found = collection.find(&doc! { "where": { name: "Alice" } })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`collection`] - The adapter façade: find, insert, update, destroy
//! - [`common`] - Shared types: values, record identifiers, sort order
//! - [`connection`] - Connection configuration and the per-operation guard
//! - [`criteria`] - Criteria parsing and aggregation post-processing
//! - [`document`] - The document value type and construction macros
//! - [`driver`] - The native-store seam and the in-memory reference driver
//! - [`errors`] - Error types and result definitions
//! - [`index`] - Index descriptors built from schema flags
//! - [`normalizer`] - Identifier and result-shape normalization
//! - [`schema`] - Declarative field definitions and value shaping

use crate::common::*;

pub mod collection;
pub mod common;
pub mod connection;
pub mod criteria;
pub mod document;
pub mod driver;
pub mod errors;
pub mod index;
pub mod normalizer;
pub mod schema;
