//! Record store over the PostgREST API

mod query;
mod types;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::store::{Collection, Filter, Record, RecordStore};

pub use query::*;
pub use types::*;

/// [`RecordStore`] backed by a PostgREST service
pub struct PostgrestStore {
    /// The base URL of the service
    url: String,

    /// The anonymous API key
    pub(crate) key: String,

    /// User token sent instead of the API key once signed in
    pub(crate) access_token: Option<String>,

    /// Schema selected through the profile headers
    pub(crate) schema: String,

    /// Per-request timeout
    pub(crate) timeout: Option<Duration>,

    /// HTTP client
    pub(crate) client: Client,
}

impl PostgrestStore {
    /// Create a new store client
    pub fn new(url: &str, key: &str, client: Client, options: &ClientOptions) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            access_token: None,
            schema: options.db_schema.clone(),
            timeout: options.request_timeout,
            client,
        }
    }

    /// Authenticate requests with a user access token
    pub fn with_auth(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }

    fn table_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.url, collection.as_str())
    }

    /// Select columns from a collection
    pub fn select(&self, collection: Collection, columns: &str) -> SelectBuilder<'_> {
        SelectBuilder::new(self, collection, columns)
    }

    /// Insert or replace rows in a collection
    pub fn upsert(&self, collection: Collection, values: Vec<Record>) -> UpsertBuilder<'_> {
        UpsertBuilder::new(self, collection, values)
    }

    /// Update rows in a collection
    pub fn update(&self, collection: Collection, values: Record) -> UpdateBuilder<'_> {
        UpdateBuilder::new(self, collection, values)
    }

    /// Delete rows from a collection
    pub fn delete(&self, collection: Collection) -> DeleteBuilder<'_> {
        DeleteBuilder::new(self, collection)
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn get_records(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Record>, Error> {
        self.select(collection, "*").filter(filter).execute().await
    }

    async fn upsert_batch(
        &self,
        collection: Collection,
        records: Vec<Record>,
    ) -> Result<(), Error> {
        if records.is_empty() {
            return Ok(());
        }
        log::debug!("Upserting {} rows into {}", records.len(), collection);
        self.upsert(collection, records)
            .on_conflict(collection.conflict_key())
            .execute()
            .await
    }

    async fn update_record(
        &self,
        collection: Collection,
        id: &str,
        fields: Record,
    ) -> Result<(), Error> {
        self.update(collection, fields).eq("id", id).execute().await
    }

    async fn delete_record(&self, collection: Collection, id: &str) -> Result<(), Error> {
        self.delete(collection).eq("id", id).execute().await
    }
}
