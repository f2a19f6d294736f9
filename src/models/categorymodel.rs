use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub icon: String,
    /// Number of live tasks referencing this category, maintained by the
    /// `create_task` / `delete_task` procedures.
    pub task_count: i64,
}
