use super::{Cursor, Document, DocumentStore, Filter, Namespace};
use core::time::Duration;
use creature_core::{Error, Result, types::SERVER_SERVICE_NAME};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client,
    bson::{self, Bson, doc},
    options::ClientOptions,
};

/// How long the driver waits for a usable server before a command fails,
/// unless the connection string sets `serverSelectionTimeoutMS`.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// MongoDB-backed store.
///
/// The driver's [`Client`] is internally pooled and cheap to share, so one
/// instance serves every handler.
#[derive(Clone, Debug)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Builds a client for `uri`.
    ///
    /// The driver connects lazily; [`super::connect`] pings the deployment
    /// before the store is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the URI is malformed or cannot be resolved.
    pub async fn connect(uri: &str) -> Result<Self> {
        let mut options = ClientOptions::parse(uri).await.map_err(Error::store)?;
        options.app_name.get_or_insert_with(|| SERVER_SERVICE_NAME.to_string());
        options
            .server_selection_timeout
            .get_or_insert(SERVER_SELECTION_TIMEOUT);

        let client = Client::with_options(options).map_err(Error::store)?;
        tracing::debug!("MongoDB client ready");
        Ok(Self { client })
    }
}

#[tonic::async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(Error::store)
    }

    async fn find(&self, namespace: &Namespace, filter: &Filter) -> Result<Cursor> {
        let collection = self
            .client
            .database(&namespace.database)
            .collection::<bson::Document>(&namespace.collection);

        let mut query = bson::Document::new();
        query.insert(filter.field.clone(), filter.value.clone());

        let cursor = collection.find(query).await.map_err(Error::store)?;

        Ok(cursor
            .map_ok(into_json_document)
            .map_err(Error::store)
            .boxed())
    }

    async fn shutdown(&self) {
        self.client.clone().shutdown().await;
        tracing::debug!("Disconnected from MongoDB");
    }
}

fn into_json_document(document: bson::Document) -> Document {
    match Bson::Document(document).into_relaxed_extjson() {
        serde_json::Value::Object(map) => map,
        _ => Document::new(),
    }
}
