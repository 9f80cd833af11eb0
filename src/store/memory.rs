use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

use super::{column_text, Collection, Filter, Record, RecordStore, SortOrder};
use crate::error::Error;

/// In-process record store with the same upsert semantics as the remote one
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Collection, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows of a collection in insertion order
    pub fn records(&self, collection: Collection) -> Vec<Record> {
        self.tables
            .lock()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn key_of(collection: Collection, record: &Record) -> Result<Vec<String>, Error> {
        collection
            .conflict_key()
            .iter()
            .map(|column| {
                record
                    .get(*column)
                    .map(column_text)
                    .ok_or_else(|| Error::general(format!("{} row without {}", collection, column)))
            })
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_records(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Record>, Error> {
        let mut rows: Vec<Record> = self
            .tables
            .lock()
            .get(&collection)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some((column, order)) = filter.ordering() {
            rows.sort_by_key(|r| r.get(column).map(column_text).unwrap_or_default());
            if order == SortOrder::Descending {
                rows.reverse();
            }
        }
        Ok(rows)
    }

    async fn upsert_batch(
        &self,
        collection: Collection,
        records: Vec<Record>,
    ) -> Result<(), Error> {
        let keyed = records
            .into_iter()
            .map(|r| Self::key_of(collection, &r).map(|k| (k, r)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = self.tables.lock();
        let rows = tables.entry(collection).or_default();
        for (key, record) in keyed {
            let existing = rows
                .iter()
                .position(|r| Self::key_of(collection, r).ok().as_ref() == Some(&key));
            match existing {
                Some(index) => rows[index] = record,
                None => rows.push(record),
            }
        }
        Ok(())
    }

    async fn update_record(
        &self,
        collection: Collection,
        id: &str,
        fields: Record,
    ) -> Result<(), Error> {
        let Value::Object(fields) = fields else {
            return Err(Error::general("update fields must be a JSON object"));
        };

        let mut tables = self.tables.lock();
        let found = tables.get_mut(&collection).and_then(|rows| {
            rows.iter_mut()
                .find(|r| r.get("id").map(column_text).as_deref() == Some(id))
        });
        if let Some(Value::Object(row)) = found {
            row.extend(fields);
        }
        Ok(())
    }

    async fn delete_record(&self, collection: Collection, id: &str) -> Result<(), Error> {
        if let Some(rows) = self.tables.lock().get_mut(&collection) {
            rows.retain(|r| r.get("id").map(column_text).as_deref() != Some(id));
        }
        Ok(())
    }
}
