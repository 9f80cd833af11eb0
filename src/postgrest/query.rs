//! Request builders for the PostgREST adapter

use serde_json::Value;

use crate::error::Error;
use crate::fetch::{Fetch, FetchBuilder};
use crate::postgrest::{PostgrestStore, RETURN_MINIMAL};
use crate::store::{Collection, Filter, Record};

const CLIENT_INFO: &str = concat!("classroll/", env!("CARGO_PKG_VERSION"));

/// Attach the headers every request to the service carries
fn authorize<'a>(
    store: &'a PostgrestStore,
    fetch: FetchBuilder<'a>,
    profile_header: &str,
) -> FetchBuilder<'a> {
    fetch
        .header("apikey", &store.key)
        .bearer_auth(store.access_token.as_deref().unwrap_or(&store.key))
        .header("X-Client-Info", CLIENT_INFO)
        .header(profile_header, &store.schema)
        .timeout(store.timeout)
}

/// Builder for SELECT queries
pub struct SelectBuilder<'a> {
    store: &'a PostgrestStore,
    collection: Collection,
    params: Vec<(String, String)>,
}

impl<'a> SelectBuilder<'a> {
    pub(crate) fn new(store: &'a PostgrestStore, collection: Collection, columns: &str) -> Self {
        Self {
            store,
            collection,
            params: vec![("select".to_string(), columns.to_string())],
        }
    }

    /// Filter rows where column equals a value
    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.params.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    /// Apply every condition and the ordering of a [`Filter`]
    pub fn filter(mut self, filter: &Filter) -> Self {
        for (column, value) in filter.conditions() {
            self = self.eq(column, value);
        }
        if let Some((column, order)) = filter.ordering() {
            self.params.push(("order".to_string(), format!("{}.{}", column, order.as_str())));
        }
        self
    }

    /// Execute the query and return the rows
    pub async fn execute(self) -> Result<Vec<Record>, Error> {
        let url = self.store.table_url(self.collection);
        let fetch = Fetch::get(&self.store.client, &url).query(self.params);
        authorize(self.store, fetch, "Accept-Profile")
            .execute::<Vec<Value>>()
            .await
    }
}

/// Builder for UPSERT queries
pub struct UpsertBuilder<'a> {
    store: &'a PostgrestStore,
    collection: Collection,
    values: Vec<Record>,
    on_conflict: Option<String>,
}

impl<'a> UpsertBuilder<'a> {
    pub(crate) fn new(
        store: &'a PostgrestStore,
        collection: Collection,
        values: Vec<Record>,
    ) -> Self {
        Self {
            store,
            collection,
            values,
            on_conflict: None,
        }
    }

    /// Specify the column(s) to check for conflicts
    pub fn on_conflict(mut self, columns: &[&str]) -> Self {
        self.on_conflict = Some(columns.join(","));
        self
    }

    /// Execute the upsert without returning the written rows
    pub async fn execute(self) -> Result<(), Error> {
        let url = self.store.table_url(self.collection);
        let mut fetch = Fetch::post(&self.store.client, &url).header(
            "Prefer",
            &format!("resolution=merge-duplicates,{}", RETURN_MINIMAL),
        );
        if let Some(columns) = self.on_conflict {
            fetch = fetch.query([("on_conflict", columns)]);
        }
        authorize(self.store, fetch, "Content-Profile")
            .json(&self.values)?
            .execute_empty()
            .await
    }
}

/// Builder for UPDATE queries
pub struct UpdateBuilder<'a> {
    store: &'a PostgrestStore,
    collection: Collection,
    values: Record,
    params: Vec<(String, String)>,
}

impl<'a> UpdateBuilder<'a> {
    pub(crate) fn new(store: &'a PostgrestStore, collection: Collection, values: Record) -> Self {
        Self {
            store,
            collection,
            values,
            params: Vec::new(),
        }
    }

    /// Filter rows where column equals a value
    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.params.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    /// Execute the update without returning the updated rows
    pub async fn execute(self) -> Result<(), Error> {
        let url = self.store.table_url(self.collection);
        let fetch = Fetch::patch(&self.store.client, &url)
            .header("Prefer", RETURN_MINIMAL)
            .query(self.params);
        authorize(self.store, fetch, "Content-Profile")
            .json(&self.values)?
            .execute_empty()
            .await
    }
}

/// Builder for DELETE queries
pub struct DeleteBuilder<'a> {
    store: &'a PostgrestStore,
    collection: Collection,
    params: Vec<(String, String)>,
}

impl<'a> DeleteBuilder<'a> {
    pub(crate) fn new(store: &'a PostgrestStore, collection: Collection) -> Self {
        Self {
            store,
            collection,
            params: Vec::new(),
        }
    }

    /// Filter rows where column equals a value
    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.params.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    /// Execute the delete without returning the removed rows
    pub async fn execute(self) -> Result<(), Error> {
        let url = self.store.table_url(self.collection);
        let fetch = Fetch::delete(&self.store.client, &url)
            .header("Prefer", RETURN_MINIMAL)
            .query(self.params);
        authorize(self.store, fetch, "Content-Profile")
            .execute_empty()
            .await
    }
}
