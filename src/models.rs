//! Rows of the directory collections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recurring group session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

/// A student enrolled in one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub class_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrolled_at: Option<DateTime<Utc>>,
}

/// A teacher, linked to a class by the class's name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub class_name: Option<String>,
}

impl Teacher {
    /// Whether the teacher currently references `class_name`
    pub fn teaches(&self, class_name: &str) -> bool {
        self.class_name.as_deref() == Some(class_name)
    }

    /// Whether the teacher counts as free for assignment
    pub fn is_unassigned(&self, unassigned_label: &str) -> bool {
        match self.class_name.as_deref() {
            None => true,
            Some(name) => name.is_empty() || name == unassigned_label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn teacher(class_name: Option<&str>) -> Teacher {
        Teacher {
            id: "t".into(),
            name: "Ada".into(),
            class_name: class_name.map(str::to_string),
        }
    }

    #[test]
    fn unassigned_covers_empty_missing_and_sentinel() {
        assert!(teacher(None).is_unassigned("Unassigned"));
        assert!(teacher(Some("")).is_unassigned("Unassigned"));
        assert!(teacher(Some("Unassigned")).is_unassigned("Unassigned"));
        assert!(!teacher(Some("Yoga")).is_unassigned("Unassigned"));
    }

    #[test]
    fn teacher_row_without_class_name_deserializes() {
        let t: Teacher = serde_json::from_value(json!({ "id": "t1", "name": "Ada" })).unwrap();
        assert_eq!(t.class_name, None);
        assert!(!t.teaches("Yoga"));
    }
}
