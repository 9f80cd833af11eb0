//! Class ↔ teacher relational integrity
//!
//! Teachers reference their class by name, and the store has no cascade.
//! Deleting a class is therefore a two step saga: remove the class row,
//! then clear `class_name` on every teacher that still points at it. The
//! second step can fail part way; [`CascadeOutcome::PartialFailure`] says
//! which teachers are left over and [`Integrity::finish_cascade`] retries
//! just that residue.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientOptions;
use crate::error::{Error, IntegrityError};
use crate::feedback::{Category, Feedback};
use crate::models::{ClassRecord, Teacher};
use crate::store::{bounded, fetch_all, Collection, Filter, RecordStore};

/// Teachers free to be assigned: no class, empty class, or the sentinel label
pub fn candidate_teachers<'a>(teachers: &'a [Teacher], unassigned_label: &str) -> Vec<&'a Teacher> {
    teachers
        .iter()
        .filter(|t| t.is_unassigned(unassigned_label))
        .collect()
}

/// How far a class deletion got
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// Class removed and every matching teacher unassigned
    Complete {
        deleted_class: ClassRecord,
        unassigned: Vec<String>,
    },
    /// Class removed, but some teachers may still reference it
    PartialFailure {
        deleted_class: ClassRecord,
        failed_unassigns: Vec<String>,
        reason: String,
    },
}

impl CascadeOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, CascadeOutcome::Complete { .. })
    }

    pub fn deleted_class(&self) -> &ClassRecord {
        match self {
            CascadeOutcome::Complete { deleted_class, .. }
            | CascadeOutcome::PartialFailure { deleted_class, .. } => deleted_class,
        }
    }
}

/// A pending unassignment; nothing is written until it is confirmed
#[must_use = "an unassign request does nothing until confirmed"]
pub struct UnassignRequest<'a> {
    integrity: &'a Integrity,
    teacher_id: String,
}

impl UnassignRequest<'_> {
    pub fn teacher_id(&self) -> &str {
        &self.teacher_id
    }

    /// Clear the teacher's class reference
    pub async fn confirm(self) -> Result<(), IntegrityError> {
        match self.integrity.clear_class(&self.teacher_id).await {
            Ok(()) => {
                log::info!("Teacher {} unassigned", self.teacher_id);
                self.integrity
                    .feedback
                    .notify("Teacher unassigned", Category::Success);
                Ok(())
            }
            Err(e) => {
                log::error!("Unassigning teacher {} failed: {}", self.teacher_id, e);
                self.integrity
                    .feedback
                    .notify(format!("Failed to unassign teacher: {}", e), Category::Error);
                Err(e.into())
            }
        }
    }

    /// Drop the request without touching the store
    pub fn cancel(self) {
        log::debug!("Unassign of teacher {} cancelled", self.teacher_id);
    }
}

/// Enforces that a teacher belongs to at most one class
pub struct Integrity {
    store: Arc<dyn RecordStore>,
    feedback: Feedback,
    timeout: Option<Duration>,
    unassigned_label: String,
}

impl Integrity {
    pub fn new(store: Arc<dyn RecordStore>, feedback: Feedback, options: &ClientOptions) -> Self {
        Self {
            store,
            feedback,
            timeout: options.request_timeout,
            unassigned_label: options.unassigned_label.clone(),
        }
    }

    /// Point a teacher at `class_name`, replacing any previous assignment
    pub async fn assign(&self, teacher_id: &str, class_name: &str) -> Result<(), IntegrityError> {
        let result = bounded(
            self.timeout,
            self.store.update_record(
                Collection::Teachers,
                teacher_id,
                json!({ "class_name": class_name }),
            ),
        )
        .await;

        match result {
            Ok(()) => {
                log::info!("Teacher {} assigned to {}", teacher_id, class_name);
                self.feedback
                    .notify(format!("Teacher assigned to {}", class_name), Category::Success);
                Ok(())
            }
            Err(e) => {
                log::error!("Assigning teacher {} failed: {}", teacher_id, e);
                self.feedback
                    .notify(format!("Failed to assign teacher: {}", e), Category::Error);
                Err(e.into())
            }
        }
    }

    /// Start an unassignment that needs explicit confirmation
    pub fn request_unassign(&self, teacher_id: &str) -> UnassignRequest<'_> {
        UnassignRequest {
            integrity: self,
            teacher_id: teacher_id.to_string(),
        }
    }

    /// Delete a class, then unassign its teachers one by one
    pub async fn delete_class(&self, class_id: &str) -> Result<CascadeOutcome, IntegrityError> {
        let class = match self.delete_class_row(class_id).await {
            Ok(class) => class,
            Err(e) => {
                log::error!("Deleting class {} failed: {}", class_id, e);
                self.feedback
                    .notify(format!("Failed to delete class: {}", e), Category::Error);
                return Err(e);
            }
        };
        log::info!("Class {} ({}) deleted", class.id, class.name);
        Ok(self.finish_cascade(&class).await)
    }

    /// Unassign every teacher still referencing a deleted class
    pub async fn finish_cascade(&self, deleted_class: &ClassRecord) -> CascadeOutcome {
        let outcome = self.run_cascade(deleted_class).await;
        match &outcome {
            CascadeOutcome::Complete { unassigned, .. } => {
                log::info!(
                    "Cascade for class {} unassigned {} teachers",
                    deleted_class.name,
                    unassigned.len()
                );
                self.feedback.notify(
                    format!("Class {} deleted", deleted_class.name),
                    Category::Success,
                );
            }
            CascadeOutcome::PartialFailure {
                failed_unassigns,
                reason,
                ..
            } => {
                log::error!(
                    "Cascade for class {} left {} teachers assigned: {}",
                    deleted_class.name,
                    failed_unassigns.len(),
                    reason
                );
                self.feedback.notify(
                    format!(
                        "Class {} deleted, but some teachers are still assigned to it: {}",
                        deleted_class.name, reason
                    ),
                    Category::Error,
                );
            }
        }
        outcome
    }

    /// Teachers that can be offered for assignment
    pub async fn candidates(&self) -> Result<Vec<Teacher>, Error> {
        let teachers = bounded(
            self.timeout,
            fetch_all::<Teacher>(self.store.as_ref(), Collection::Teachers, &Filter::new()),
        )
        .await
        .map_err(|e| {
            self.feedback
                .notify(format!("Failed to load teachers: {}", e), Category::Error);
            e
        })?;

        Ok(candidate_teachers(&teachers, &self.unassigned_label)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn delete_class_row(&self, class_id: &str) -> Result<ClassRecord, IntegrityError> {
        let filter = Filter::new().eq("id", class_id);
        let class = bounded(
            self.timeout,
            fetch_all::<ClassRecord>(self.store.as_ref(), Collection::Classes, &filter),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| IntegrityError::ClassNotFound(class_id.to_string()))?;

        bounded(
            self.timeout,
            self.store.delete_record(Collection::Classes, class_id),
        )
        .await?;
        Ok(class)
    }

    async fn run_cascade(&self, deleted_class: &ClassRecord) -> CascadeOutcome {
        let filter = Filter::new().eq("class_name", &deleted_class.name);
        let teachers = match bounded(
            self.timeout,
            fetch_all::<Teacher>(self.store.as_ref(), Collection::Teachers, &filter),
        )
        .await
        {
            Ok(teachers) => teachers,
            Err(e) => {
                return CascadeOutcome::PartialFailure {
                    deleted_class: deleted_class.clone(),
                    failed_unassigns: Vec::new(),
                    reason: format!("could not look up teachers: {}", e),
                }
            }
        };

        let mut unassigned = Vec::new();
        let mut failed = Vec::new();
        let mut last_error = None;
        for teacher in teachers.iter().filter(|t| t.teaches(&deleted_class.name)) {
            match self.clear_class(&teacher.id).await {
                Ok(()) => unassigned.push(teacher.id.clone()),
                Err(e) => {
                    log::warn!("Unassigning teacher {} failed: {}", teacher.id, e);
                    failed.push(teacher.id.clone());
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            None => CascadeOutcome::Complete {
                deleted_class: deleted_class.clone(),
                unassigned,
            },
            Some(e) => CascadeOutcome::PartialFailure {
                deleted_class: deleted_class.clone(),
                failed_unassigns: failed,
                reason: e.to_string(),
            },
        }
    }

    async fn clear_class(&self, teacher_id: &str) -> Result<(), Error> {
        bounded(
            self.timeout,
            self.store
                .update_record(Collection::Teachers, teacher_id, json!({ "class_name": "" })),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn teacher(id: &str, class_name: Option<&str>) -> Teacher {
        Teacher {
            id: id.into(),
            name: format!("Teacher {}", id),
            class_name: class_name.map(str::to_string),
        }
    }

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_batch(
                Collection::Classes,
                vec![json!({ "id": "c1", "name": "Yoga" }), json!({ "id": "c2", "name": "Judo" })],
            )
            .await
            .unwrap();
        store
            .upsert_batch(
                Collection::Teachers,
                vec![
                    json!({ "id": "t1", "name": "Ada", "class_name": "Yoga" }),
                    json!({ "id": "t2", "name": "Bo", "class_name": "Yoga" }),
                    json!({ "id": "t3", "name": "Cy", "class_name": "Judo" }),
                    json!({ "id": "t4", "name": "Di" }),
                ],
            )
            .await
            .unwrap();
        store
    }

    fn teachers_of(store: &MemoryStore, class_name: &str) -> usize {
        store
            .records(Collection::Teachers)
            .iter()
            .filter(|t| t["class_name"] == class_name)
            .count()
    }

    #[test]
    fn candidates_are_unassigned_or_sentinel() {
        let teachers = vec![
            teacher("a", None),
            teacher("b", Some("")),
            teacher("c", Some("Unassigned")),
            teacher("d", Some("Yoga")),
        ];
        let ids: Vec<_> = candidate_teachers(&teachers, "Unassigned")
            .into_iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn assign_overwrites_an_existing_assignment() {
        let store = seeded().await;
        let feedback = Feedback::mount(&ClientOptions::default()).unwrap();
        let integrity = Integrity::new(store.clone(), feedback.clone(), &ClientOptions::default());

        integrity.assign("t3", "Yoga").await.unwrap();

        assert_eq!(teachers_of(&store, "Yoga"), 3);
        assert_eq!(teachers_of(&store, "Judo"), 0);
        assert_eq!(feedback.notifications()[0].category, Category::Success);
    }

    #[tokio::test]
    async fn unassign_needs_confirmation() {
        let store = seeded().await;
        let feedback = Feedback::mount(&ClientOptions::default()).unwrap();
        let integrity = Integrity::new(store.clone(), feedback.clone(), &ClientOptions::default());

        integrity.request_unassign("t1").cancel();
        assert_eq!(teachers_of(&store, "Yoga"), 2);
        assert!(feedback.notifications().is_empty());

        let request = integrity.request_unassign("t1");
        assert_eq!(request.teacher_id(), "t1");
        request.confirm().await.unwrap();
        assert_eq!(teachers_of(&store, "Yoga"), 1);
    }

    #[tokio::test]
    async fn delete_class_clears_every_matching_teacher() {
        let store = seeded().await;
        let feedback = Feedback::mount(&ClientOptions::default()).unwrap();
        let integrity = Integrity::new(store.clone(), feedback.clone(), &ClientOptions::default());

        let outcome = integrity.delete_class("c1").await.unwrap();

        match &outcome {
            CascadeOutcome::Complete { unassigned, .. } => {
                assert_eq!(unassigned, &vec!["t1".to_string(), "t2".to_string()])
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(outcome.is_complete());
        assert_eq!(outcome.deleted_class().name, "Yoga");
        assert_eq!(teachers_of(&store, "Yoga"), 0);
        assert_eq!(teachers_of(&store, "Judo"), 1);
        assert_eq!(store.records(Collection::Classes).len(), 1);
    }

    #[tokio::test]
    async fn delete_of_missing_class_touches_nothing() {
        let store = seeded().await;
        let feedback = Feedback::mount(&ClientOptions::default()).unwrap();
        let integrity = Integrity::new(store.clone(), feedback.clone(), &ClientOptions::default());

        let result = integrity.delete_class("nope").await;

        assert!(matches!(result, Err(IntegrityError::ClassNotFound(_))));
        assert_eq!(teachers_of(&store, "Yoga"), 2);
        assert_eq!(feedback.notifications()[0].category, Category::Error);
    }

    #[tokio::test]
    async fn candidates_reads_from_the_store() {
        let store = seeded().await;
        let feedback = Feedback::mount(&ClientOptions::default()).unwrap();
        let integrity = Integrity::new(store, feedback, &ClientOptions::default());

        let ids: Vec<_> = integrity
            .candidates()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["t4"]);
    }
}
