//! Backing document store.
//!
//! Handlers never talk to a database driver directly. They receive a
//! [`SharedStore`] at construction time and issue queries through the
//! [`DocumentStore`] trait, which lets tests substitute their own store.
//!
//! ## Structure
//!
//! - [`memory`] - In-process store (`memory://`).
//! - `mongo` - MongoDB store (`mongodb://`, requires the `mongodb` feature).
//! - [`document`] - Mapping from stored documents to [`Creature`] messages.
//!
//! [`Creature`]: creature_core::proto::Creature

pub mod document;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;

use crate::server::config::StoreUri;
use core::fmt;
use creature_core::{Error, Result};
use futures::stream::BoxStream;
use std::sync::Arc;

/// A stored document, in relaxed extended-JSON form.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Lazy, finite, non-restartable sequence of query results.
pub type Cursor = BoxStream<'static, Result<Document>>;

/// Store handle shared by every handler invocation.
pub type SharedStore = Arc<dyn DocumentStore>;

/// A `database.collection` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Equality match on a single top-level string field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        document
            .get(&self.field)
            .and_then(serde_json::Value::as_str)
            .is_some_and(|value| value == self.value)
    }
}

/// The fixed query `GetCreatures` runs, independent of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub namespace: Namespace,
    pub filter: Filter,
}

/// Capability interface over a document database.
///
/// Implementations must be safe to share between concurrently running
/// handlers.
#[tonic::async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Verifies the store is reachable.
    async fn ping(&self) -> Result<()>;

    /// Opens a cursor over every document in `namespace` matching `filter`.
    ///
    /// A lookup that matches nothing is an empty cursor, not an error.
    async fn find(&self, namespace: &Namespace, filter: &Filter) -> Result<Cursor>;

    /// Releases the connection. Called once on server exit.
    async fn shutdown(&self) {}
}

/// Connects to the store named by `uri` and verifies it responds.
///
/// # Errors
///
/// Returns [`Error::Store`] if the store is unreachable, or
/// [`Error::InvalidConfig`] if the binary was built without support for the
/// URI's scheme.
pub async fn connect(uri: &StoreUri) -> Result<SharedStore> {
    let store: SharedStore = match uri {
        #[cfg(feature = "mongodb")]
        StoreUri::Mongo(uri) => Arc::new(mongo::MongoStore::connect(uri).await?),
        #[cfg(not(feature = "mongodb"))]
        StoreUri::Mongo(_) => {
            return Err(Error::InvalidConfig {
                reason: "MongoDB support requires the `mongodb` feature".to_string(),
            });
        }
        StoreUri::Memory => Arc::new(memory::MemoryStore::default()),
    };
    store.ping().await?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn filter_matches_string_fields_only() {
        let filter = Filter::eq("title", "Back to the Future");

        assert!(filter.matches(&doc(json!({ "title": "Back to the Future" }))));
        assert!(!filter.matches(&doc(json!({ "title": "Back to the Future II" }))));
        assert!(!filter.matches(&doc(json!({ "name": "Back to the Future" }))));
        assert!(!filter.matches(&doc(json!({ "title": 1985 }))));
    }

    #[test]
    fn namespace_display() {
        assert_eq!(
            Namespace::new("fakeDatabase", "movies").to_string(),
            "fakeDatabase.movies"
        );
    }

    #[tokio::test]
    async fn memory_uri_connects_to_empty_store() {
        let store = connect(&StoreUri::Memory).await.unwrap();
        let cursor = store
            .find(
                &Namespace::new("fakeDatabase", "movies"),
                &Filter::eq("title", "Back to the Future"),
            )
            .await
            .unwrap();

        use futures::StreamExt;
        assert_eq!(cursor.count().await, 0);
    }
}
