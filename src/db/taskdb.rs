// db/taskdb.rs
use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{
    gateway::{from_row, from_rows, Filter, GatewayError, Order},
    DBClient,
};
use crate::{
    dtos::taskdtos::TaskFilters,
    models::taskmodel::{Bid, NewTask, Review, Task, TaskStatus},
};

pub const TASKS_TABLE: &str = "tasks";
pub const BIDS_TABLE: &str = "bids";
pub const REVIEWS_TABLE: &str = "reviews";

#[async_trait]
pub trait TaskExt {
    /// Rows satisfying every filter, newest first.
    async fn get_tasks(&self, filters: &TaskFilters) -> Result<Vec<Task>, GatewayError>;

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>, GatewayError>;

    /// Inserts the row and bumps its category counter in one procedure call.
    async fn create_task(&self, task: NewTask) -> Result<Task, GatewayError>;

    async fn update_task(&self, task_id: Uuid, patch: Value) -> Result<Option<Task>, GatewayError>;

    /// Conditional write: only applies while the row still has `expected` status.
    async fn update_task_if_status(
        &self,
        task_id: Uuid,
        expected: TaskStatus,
        patch: Value,
    ) -> Result<Option<Task>, GatewayError>;

    /// Moves the task to another category (or none), shifting both category
    /// counters in one procedure call. `None` if the task does not exist.
    async fn reassign_task_category(
        &self,
        task_id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<Option<Task>, GatewayError>;

    /// Deletes the row and decrements its category counter in one procedure
    /// call. Returns the deleted row, `None` if it did not exist.
    async fn delete_task(&self, task_id: Uuid) -> Result<Option<Task>, GatewayError>;

    async fn get_task_bids(&self, task_id: Uuid) -> Result<Vec<Bid>, GatewayError>;

    async fn get_user_reviews(&self, reviewee_id: Uuid) -> Result<Vec<Review>, GatewayError>;
}

#[async_trait]
impl TaskExt for DBClient {
    async fn get_tasks(&self, filters: &TaskFilters) -> Result<Vec<Task>, GatewayError> {
        let rows = self
            .gateway
            .query(TASKS_TABLE, &filters.to_filters(), Some(Order::desc("created_at")))
            .await?;
        from_rows(rows)
    }

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>, GatewayError> {
        self.gateway
            .get_by_id(TASKS_TABLE, task_id)
            .await?
            .map(from_row)
            .transpose()
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, GatewayError> {
        let row = self
            .gateway
            .call_procedure("create_task", json!({ "task": task }))
            .await?;
        from_row(row)
    }

    async fn update_task(&self, task_id: Uuid, patch: Value) -> Result<Option<Task>, GatewayError> {
        self.gateway
            .update(TASKS_TABLE, &[Filter::eq("id", task_id)], patch)
            .await?
            .into_iter()
            .next()
            .map(from_row)
            .transpose()
    }

    async fn update_task_if_status(
        &self,
        task_id: Uuid,
        expected: TaskStatus,
        patch: Value,
    ) -> Result<Option<Task>, GatewayError> {
        let filters = [Filter::eq("id", task_id), Filter::eq("status", expected)];

        self.gateway
            .update(TASKS_TABLE, &filters, patch)
            .await?
            .into_iter()
            .next()
            .map(from_row)
            .transpose()
    }

    async fn delete_task(&self, task_id: Uuid) -> Result<Option<Task>, GatewayError> {
        let row = self
            .gateway
            .call_procedure("delete_task", json!({ "task_id": task_id }))
            .await?;

        if row.is_null() {
            return Ok(None);
        }
        from_row(row).map(Some)
    }

    async fn reassign_task_category(
        &self,
        task_id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<Option<Task>, GatewayError> {
        let row = self
            .gateway
            .call_procedure(
                "reassign_task_category",
                json!({ "task_id": task_id, "category_id": category_id }),
            )
            .await?;

        if row.is_null() {
            return Ok(None);
        }
        from_row(row).map(Some)
    }

    async fn get_task_bids(&self, task_id: Uuid) -> Result<Vec<Bid>, GatewayError> {
        let rows = self
            .gateway
            .query(
                BIDS_TABLE,
                &[Filter::eq("task_id", task_id)],
                Some(Order::desc("created_at")),
            )
            .await?;
        from_rows(rows)
    }

    async fn get_user_reviews(&self, reviewee_id: Uuid) -> Result<Vec<Review>, GatewayError> {
        let rows = self
            .gateway
            .query(
                REVIEWS_TABLE,
                &[Filter::eq("reviewee_id", reviewee_id)],
                Some(Order::desc("created_at")),
            )
            .await?;
        from_rows(rows)
    }
}
