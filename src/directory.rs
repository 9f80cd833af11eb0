//! Classes, their rosters and the teacher list

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::ClientOptions;
use crate::error::{Error, LoadError};
use crate::feedback::{Category, Feedback};
use crate::models::{ClassRecord, Member, Teacher};
use crate::store::{bounded, fetch_all, Collection, Filter, RecordStore, SortOrder};

/// Read and write access to the directory collections
pub struct Directory {
    store: Arc<dyn RecordStore>,
    feedback: Feedback,
    timeout: Option<Duration>,
}

impl Directory {
    pub fn new(store: Arc<dyn RecordStore>, feedback: Feedback, options: &ClientOptions) -> Self {
        Self {
            store,
            feedback,
            timeout: options.request_timeout,
        }
    }

    /// All classes, ordered by name
    pub async fn classes(&self) -> Result<Vec<ClassRecord>, LoadError> {
        let filter = Filter::new().order("name", SortOrder::Ascending);
        self.load(Collection::Classes, &filter, "classes").await
    }

    pub async fn create_class(
        &self,
        name: &str,
        schedule: Option<&str>,
    ) -> Result<ClassRecord, Error> {
        let class = ClassRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            schedule: schedule.map(str::to_string),
        };
        self.insert(Collection::Classes, &class, "class").await?;
        self.feedback
            .notify(format!("Class {} created", class.name), Category::Success);
        Ok(class)
    }

    /// Members of one class, ordered by name
    pub async fn roster(&self, class_id: &str) -> Result<Vec<Member>, LoadError> {
        let filter = Filter::new()
            .eq("class_id", class_id)
            .order("name", SortOrder::Ascending);
        self.load(Collection::Members, &filter, "roster").await
    }

    /// Add a member to a class and celebrate it
    pub async fn enroll(&self, class_id: &str, name: &str) -> Result<Member, Error> {
        let member = Member {
            id: Uuid::new_v4().to_string(),
            class_id: class_id.to_string(),
            name: name.to_string(),
            enrolled_at: Some(Utc::now()),
        };
        self.insert(Collection::Members, &member, "member").await?;
        log::info!("Enrolled {} in class {}", member.name, class_id);
        self.feedback.celebrate(format!("{} enrolled", member.name));
        Ok(member)
    }

    pub async fn remove_member(&self, member_id: &str) -> Result<(), Error> {
        let result = bounded(
            self.timeout,
            self.store.delete_record(Collection::Members, member_id),
        )
        .await;
        match &result {
            Ok(()) => {
                self.feedback.notify("Member removed", Category::Success);
            }
            Err(e) => {
                log::error!("Removing member {} failed: {}", member_id, e);
                self.feedback
                    .notify(format!("Failed to remove member: {}", e), Category::Error);
            }
        }
        result
    }

    /// All teachers, ordered by name
    pub async fn teachers(&self) -> Result<Vec<Teacher>, LoadError> {
        let filter = Filter::new().order("name", SortOrder::Ascending);
        self.load(Collection::Teachers, &filter, "teachers").await
    }

    /// A new teacher starts without a class
    pub async fn create_teacher(&self, name: &str) -> Result<Teacher, Error> {
        let teacher = Teacher {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            class_name: None,
        };
        self.insert(Collection::Teachers, &teacher, "teacher").await?;
        self.feedback
            .notify(format!("Teacher {} added", teacher.name), Category::Success);
        Ok(teacher)
    }

    async fn load<T: serde::de::DeserializeOwned>(
        &self,
        collection: Collection,
        filter: &Filter,
        what: &str,
    ) -> Result<Vec<T>, LoadError> {
        bounded(
            self.timeout,
            fetch_all::<T>(self.store.as_ref(), collection, filter),
        )
        .await
        .map_err(|e| {
            log::error!("Loading {} failed: {}", what, e);
            self.feedback
                .notify(format!("Failed to load {}: {}", what, e), Category::Error);
            LoadError::Store(e)
        })
    }

    async fn insert<T: serde::Serialize>(
        &self,
        collection: Collection,
        row: &T,
        what: &str,
    ) -> Result<(), Error> {
        let result = match serde_json::to_value(row) {
            Ok(record) => {
                bounded(
                    self.timeout,
                    self.store.upsert_batch(collection, vec![record]),
                )
                .await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &result {
            log::error!("Saving {} failed: {}", what, e);
            self.feedback
                .notify(format!("Failed to save {}: {}", what, e), Category::Error);
        }
        result
    }
}
