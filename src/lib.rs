//! metagraph - Metadata Catalog Graph Builder and Publisher
//!
//! metagraph turns catalog metadata (tables, columns, queries, joins, filters,
//! nested column types) into a property graph and publishes that graph into a
//! schemaful graph store. Runs can be repeated without duplicating anything.
//!
//! # Architecture
//!
//! - **Entities → Records**: every entity derives its own content key and emits
//!   node and relationship records lazily through a cursor
//! - **Records → Files**: a loader writes vertex and edge record files, one per
//!   label and header
//! - **Files → Store**: the publisher reconciles tag and edge schemas against
//!   the live store, then writes tagged, batched upserts with retries
//!
//! # Features
//!
//! - **Deterministic Keys**: SQL hashes ignore formatting; commutative joins collapse
//! - **Type Flattening**: `array<map<string,struct<...>>>` becomes a subtype tree
//! - **Schema Convergence**: CREATE, or DESCRIBE and ALTER when the element exists
//! - **Store Abstraction**: in-memory store for tests, HTTP gateway for live runs
//!
//! # Example
//!
//! ```rust,no_run
//! use metagraph::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let table = TableMetadata::new("hive", "gold", "core", "orders")
//!         .with_columns(vec![ColumnMetadata::new("items", "array<string>", 0)]);
//!
//!     let mut loader = CsvLoader::new("out/nodes", "out/relationships")?;
//!     loader.load(&mut table.into_stream())?;
//!     loader.close()?;
//!
//!     let config = PublisherConfig::new("out/nodes", "out/relationships", "nightly-2024-05-01");
//!     let store = MemoryStore::new();
//!     let report = Publisher::new(store, config)?.publish().await?;
//!     println!("wrote {} vertices", report.vertices_written);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Store Support
//!
//! The HTTP gateway store and the `graph-publish` binary are behind a feature:
//!
//! ```toml
//! [dependencies]
//! metagraph = { version = "0.1", features = ["http-gateway"] }
//! ```

pub mod backend;
pub mod builder;
pub mod config;
pub mod error;
pub mod graph;
pub mod keys;
pub mod loader;
pub mod memory;
pub mod model;
pub mod publisher;
pub mod reader;
pub mod retry;
pub mod schema;

#[cfg(feature = "http-gateway")]
pub mod gateway;

pub use backend::{GraphStore, QueryResult, QueryRow, StoreResult};
pub use builder::{encode_value, InsertEdgeBuilder, InsertVertexBuilder};
pub use config::PublisherConfig;
pub use error::{GraphError, Result, StoreError};
pub use graph::{
    AttributeValue, Attributes, GraphRecords, GraphSerializable, GraphStream, Node,
    Relationship, TraversalMode,
};
pub use loader::{CsvLoader, LoadSummary};
pub use memory::MemoryStore;
pub use publisher::{PublishReport, PublishState, Publisher};
pub use reader::{ReaderConfig, RecordReader};
pub use retry::{with_retry, RetryPolicy};
pub use schema::{diff_properties, LabelSchema, PropertyDelta, PropertySet, SchemaKind};

#[cfg(feature = "http-gateway")]
pub use gateway::GatewayStore;

/// Prelude for common imports
pub mod prelude {
    pub use crate::backend::GraphStore;
    pub use crate::config::PublisherConfig;
    pub use crate::error::{GraphError, Result};
    pub use crate::graph::{GraphRecords, GraphSerializable, TraversalMode};
    pub use crate::loader::CsvLoader;
    pub use crate::memory::MemoryStore;
    pub use crate::model::{
        ColumnMetadata, QueryExecutionWindow, QueryJoin, QueryMetadata, QueryWhere,
        TableMetadata, TypeMetadata, User, WindowDuration,
    };
    pub use crate::publisher::{PublishReport, Publisher};

    #[cfg(feature = "http-gateway")]
    pub use crate::gateway::GatewayStore;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Ensure all main types are exported
        let _mode = TraversalMode::default();
        let _policy = RetryPolicy::default();
        let _kind = SchemaKind::Tag;
        let _store = MemoryStore::new();
        assert_eq!(encode_value("int64", ""), "NULL");
    }
}
