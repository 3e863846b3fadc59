use super::{Cursor, Document, DocumentStore, Filter, Namespace};
use creature_core::Result;
use futures::{StreamExt, stream};
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-process document store.
///
/// Starts empty; `memory://` gives a server that answers every lookup with a
/// miss. Tests seed it with [`MemoryStore::insert`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Namespace, Vec<Document>>>,
}

impl MemoryStore {
    pub fn insert(&self, namespace: &Namespace, document: Document) {
        self.collections
            .write()
            .entry(namespace.clone())
            .or_default()
            .push(document);
    }

    pub fn len(&self, namespace: &Namespace) -> usize {
        self.collections.read().get(namespace).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, namespace: &Namespace) -> bool {
        self.len(namespace) == 0
    }
}

#[tonic::async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find(&self, namespace: &Namespace, filter: &Filter) -> Result<Cursor> {
        // Snapshot the matches so the cursor does not hold the lock.
        let matches: Vec<Document> = self
            .collections
            .read()
            .get(namespace)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| filter.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(stream::iter(matches.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;

    fn movie(title: &str, year: u64) -> Document {
        let mut document = Document::new();
        document.insert("title".to_string(), json!(title));
        document.insert("year".to_string(), json!(year));
        document
    }

    #[tokio::test]
    async fn find_returns_only_matching_documents_in_namespace() {
        let store = MemoryStore::default();
        let movies = Namespace::new("fakeDatabase", "movies");
        let shows = Namespace::new("fakeDatabase", "shows");

        store.insert(&movies, movie("Back to the Future", 1985));
        store.insert(&movies, movie("Ghostbusters", 1984));
        store.insert(&shows, movie("Back to the Future", 1991));

        let found: Vec<Document> = store
            .find(&movies, &Filter::eq("title", "Back to the Future"))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(found, vec![movie("Back to the Future", 1985)]);
        assert_eq!(store.len(&movies), 2);
        assert_eq!(store.len(&shows), 1);
    }

    #[tokio::test]
    async fn unknown_namespace_is_an_empty_cursor() {
        let store = MemoryStore::default();
        let missing = Namespace::new("nope", "nothing");

        let found: Vec<Document> = store
            .find(&missing, &Filter::eq("title", "anything"))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert!(found.is_empty());
        assert!(store.is_empty(&missing));
    }
}
