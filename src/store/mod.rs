//! The record store contract consumed by the core
//!
//! The core only ever talks to the remote persistence service through
//! [`RecordStore`]: equality reads, batch upserts keyed by the collection's
//! key, single-record partial updates and deletes. [`PostgrestStore`] speaks
//! it over HTTP and [`MemoryStore`] keeps everything in process.
//!
//! [`PostgrestStore`]: crate::postgrest::PostgrestStore

mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::error::Error;

pub use memory::MemoryStore;

/// A single row as exchanged with the store
pub type Record = Value;

/// Collections the core reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Classes,
    Members,
    Teachers,
    Attendance,
}

impl Collection {
    /// Table name on the remote service
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Classes => "classes",
            Collection::Members => "students",
            Collection::Teachers => "teachers",
            Collection::Attendance => "attendance",
        }
    }

    /// Columns identifying a row for insert-or-replace
    pub fn conflict_key(&self) -> &'static [&'static str] {
        match self {
            Collection::Attendance => &["member_id", "class_id", "date"],
            _ => &["id"],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Equality filter over record columns, with optional ordering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, String)>,
    order: Option<(String, SortOrder)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep rows where `column` equals `value`
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.conditions.push((column.to_string(), value.to_string()));
        self
    }

    /// Order the results by a column
    pub fn order(mut self, column: &str, order: SortOrder) -> Self {
        self.order = Some((column.to_string(), order));
        self
    }

    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    pub fn ordering(&self) -> Option<(&str, SortOrder)> {
        self.order.as_ref().map(|(c, o)| (c.as_str(), *o))
    }

    /// Whether a record satisfies every condition
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|(column, value)| {
            record
                .get(column)
                .map(|v| column_text(v) == *value)
                .unwrap_or(false)
        })
    }
}

/// Text form of a column value, as it appears in an equality filter
pub(crate) fn column_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Persistence operations the core relies on
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read rows matching an equality filter
    async fn get_records(&self, collection: Collection, filter: &Filter)
        -> Result<Vec<Record>, Error>;

    /// Insert or replace rows by [`Collection::conflict_key`]
    async fn upsert_batch(&self, collection: Collection, records: Vec<Record>)
        -> Result<(), Error>;

    /// Overwrite some fields of the row with the given id
    async fn update_record(&self, collection: Collection, id: &str, fields: Record)
        -> Result<(), Error>;

    /// Remove the row with the given id
    async fn delete_record(&self, collection: Collection, id: &str) -> Result<(), Error>;
}

/// Read rows and deserialize each one
pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: Collection,
    filter: &Filter,
) -> Result<Vec<T>, Error> {
    store
        .get_records(collection, filter)
        .await?
        .into_iter()
        .map(|record| serde_json::from_value(record).map_err(Error::from))
        .collect()
}

/// Bound a store call by the configured timeout
pub(crate) async fn bounded<T, F>(timeout: Option<Duration>, call: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| Error::Timeout(limit))?,
        None => call.await,
    }
}
