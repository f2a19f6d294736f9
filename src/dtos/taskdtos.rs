use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{db::gateway::Filter, models::taskmodel::TaskStatus};

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateTaskDto {
    #[validate(length(min = 2, message = "Title must be at least 2 characters."))]
    pub title: String,

    #[validate(length(min = 10, message = "Description must be at least 10 characters."))]
    pub description: String,

    #[validate(range(min = 1.0, message = "Budget must be at least ₦1."))]
    pub budget: f64,

    pub category_id: Option<Uuid>,

    pub location: Option<String>,

    #[serde(default)]
    pub is_remote: bool,

    #[serde(default)]
    pub is_urgent: bool,

    pub deadline: Option<DateTime<Utc>>,

    #[serde(default)]
    #[validate(length(max = 4, message = "At most 4 images can be attached"))]
    pub images: Vec<String>,
}

/// Field patch for a task. `assigned_to` is not patchable here; it only
/// changes through assignment.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateTaskDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2, message = "Title must be at least 2 characters."))]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 10, message = "Description must be at least 10 characters."))]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1.0, message = "Budget must be at least ₦1."))]
    pub budget: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_remote: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_urgent: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 4, message = "At most 4 images can be attached"))]
    pub images: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

/// Conjunction of optional constraints; absent fields impose nothing.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_remote: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_urgent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    /// Case-insensitive substring of the title; blank means no constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl TaskFilters {
    pub fn to_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();

        if let Some(category_id) = self.category_id {
            filters.push(Filter::eq("category_id", category_id));
        }
        if let Some(status) = self.status {
            filters.push(Filter::eq("status", status));
        }
        if let Some(is_remote) = self.is_remote {
            filters.push(Filter::eq("is_remote", is_remote));
        }
        if let Some(is_urgent) = self.is_urgent {
            filters.push(Filter::eq("is_urgent", is_urgent));
        }
        if let Some(owner_id) = self.owner_id {
            filters.push(Filter::eq("owner_id", owner_id));
        }
        if let Some(assigned_to) = self.assigned_to {
            filters.push(Filter::eq("assigned_to", assigned_to));
        }
        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                filters.push(Filter::ilike("title", search));
            }
        }

        filters
    }

    /// Stable cache key fragment for this filter set.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filters_impose_nothing() {
        assert!(TaskFilters::default().to_filters().is_empty());
        assert_eq!(TaskFilters::default().cache_key(), "{}");
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filters = TaskFilters { search: Some("   ".into()), ..Default::default() };
        assert!(filters.to_filters().is_empty());
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let owner = Uuid::new_v4();
        let filters = TaskFilters {
            status: Some(TaskStatus::Open),
            is_remote: Some(false),
            owner_id: Some(owner),
            search: Some("Plumb".into()),
            ..Default::default()
        };

        let built = filters.to_filters();
        assert_eq!(built.len(), 4);
        assert!(built.contains(&Filter::eq("status", "open")));
        assert!(built.contains(&Filter::eq("is_remote", false)));
        assert!(built.contains(&Filter::eq("owner_id", owner)));
        assert!(built.contains(&Filter::ilike("title", "Plumb")));
    }

    #[test]
    fn test_create_task_validation() {
        let dto = CreateTaskDto {
            title: "Paint fence".into(),
            description: "Too short".into(),
            budget: 0.5,
            ..Default::default()
        };
        let errors = dto.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("description"));
        assert!(fields.contains_key("budget"));
        assert!(!fields.contains_key("title"));
    }
}
