// service/task_service.rs
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{
        cache::{keys, TASK_CACHE_TTL, TASK_LIST_CACHE_TTL},
        taskdb::TaskExt,
        DBClient,
    },
    dtos::taskdtos::{CreateTaskDto, TaskFilters, UpdateTaskDto},
    models::taskmodel::{Bid, NewTask, Review, Task, TaskStatus},
    service::{
        error::ServiceError, notification_service::NotificationService,
        session_service::SessionManager,
    },
};

#[derive(Debug, Clone)]
pub struct TaskService {
    db_client: Arc<DBClient>,
    session: Arc<SessionManager>,
    notifications: NotificationService,
}

impl TaskService {
    pub fn new(
        db_client: Arc<DBClient>,
        session: Arc<SessionManager>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            db_client,
            session,
            notifications,
        }
    }

    fn fail(&self, error: impl Into<ServiceError>) -> ServiceError {
        self.notifications.failure("Error", error.into())
    }

    /// Tasks matching every filter, newest first.
    pub async fn list_tasks(&self, filters: TaskFilters) -> Result<Vec<Task>, ServiceError> {
        let key = keys::task_list(&filters.cache_key());
        if let Some(tasks) = self.db_client.cache.get::<Vec<Task>>(&key).await {
            return Ok(tasks);
        }

        let tasks = self
            .db_client
            .get_tasks(&filters)
            .await
            .map_err(|e| self.fail(e))?;
        self.db_client.cache.set(&key, &tasks, TASK_LIST_CACHE_TTL).await;
        Ok(tasks)
    }

    pub async fn get_task(&self, task_id: Uuid) -> Result<Task, ServiceError> {
        let key = keys::task(task_id);
        if let Some(task) = self.db_client.cache.get::<Task>(&key).await {
            return Ok(task);
        }

        let task = self.fetch(task_id).await.map_err(|e| self.fail(e))?;
        self.db_client.cache.set(&key, &task, TASK_CACHE_TTL).await;
        Ok(task)
    }

    /// Uncached read used before every state check.
    async fn fetch(&self, task_id: Uuid) -> Result<Task, ServiceError> {
        self.db_client
            .get_task(task_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Task not found".to_string()))
    }

    pub async fn create_task(&self, body: CreateTaskDto) -> Result<Task, ServiceError> {
        let owner = self
            .session
            .require_user("create a task")
            .await
            .map_err(|e| self.notifications.failure("Authentication error", e))?;

        body.validate().map_err(|e| self.fail(e))?;

        let now = Utc::now();
        let new_task = NewTask {
            title: body.title,
            description: body.description,
            budget: body.budget,
            category_id: body.category_id,
            owner_id: owner.id,
            status: TaskStatus::Open,
            is_remote: body.is_remote,
            is_urgent: body.is_urgent,
            location: body.location,
            deadline: body.deadline,
            images: body.images,
            created_at: now,
            updated_at: now,
        };

        let task = self
            .db_client
            .create_task(new_task)
            .await
            .map_err(|e| self.fail(e))?;

        self.db_client.invalidate("task.create", Some(task.id)).await;
        tracing::info!("Task {} created by {}", task.id, owner.id);
        self.notifications
            .success("Task created", "Your task has been posted successfully");
        Ok(task)
    }

    /// Field patch. A patched `status` must be a legal transition from the
    /// status observed just before the write.
    pub async fn update_task(&self, task_id: Uuid, body: UpdateTaskDto) -> Result<Task, ServiceError> {
        body.validate().map_err(|e| self.fail(e))?;

        let mut patch = match serde_json::to_value(&body) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        // Category counters only move inside the reassignment procedure.
        patch.remove("category_id");

        if let Some(category_id) = body.category_id {
            self.reassign_category(task_id, category_id)
                .await
                .map_err(|e| self.fail(e))?;
        }

        let task = match body.status {
            Some(next) => self.transition(task_id, next, patch, "task.update").await,
            None => {
                patch.insert("updated_at".to_string(), json!(Utc::now()));
                self.db_client
                    .update_task(task_id, Value::Object(patch))
                    .await
                    .map_err(ServiceError::from)
                    .and_then(|task| {
                        task.ok_or_else(|| ServiceError::NotFound("Task not found".to_string()))
                    })
            }
        }
        .map_err(|e| self.fail(e))?;

        if body.status.is_none() {
            self.db_client.invalidate("task.update", Some(task_id)).await;
        }
        self.notifications
            .success("Task updated", "Your task has been updated successfully");
        Ok(task)
    }

    async fn reassign_category(&self, task_id: Uuid, category_id: Uuid) -> Result<(), ServiceError> {
        let current = self.fetch(task_id).await?;
        if current.category_id == Some(category_id) {
            return Ok(());
        }

        self.db_client
            .reassign_task_category(task_id, Some(category_id))
            .await?
            .ok_or_else(|| ServiceError::NotFound("Task not found".to_string()))?;

        self.db_client.invalidate("task.recategorize", Some(task_id)).await;
        tracing::info!("Task {} moved to category {}", task_id, category_id);
        Ok(())
    }

    pub async fn delete_task(&self, task_id: Uuid) -> Result<Task, ServiceError> {
        let deleted = self
            .db_client
            .delete_task(task_id)
            .await
            .map_err(ServiceError::from)
            .and_then(|task| task.ok_or_else(|| ServiceError::NotFound("Task not found".to_string())))
            .map_err(|e| self.fail(e))?;

        self.db_client.invalidate("task.delete", Some(task_id)).await;
        tracing::info!("Task {} deleted", task_id);
        self.notifications
            .success("Task deleted", "Your task has been deleted successfully");
        Ok(deleted)
    }

    /// `open -> assigned`, recording the worker.
    pub async fn assign_task(&self, task_id: Uuid, user_id: Uuid) -> Result<Task, ServiceError> {
        let mut patch = Map::new();
        patch.insert("assigned_to".to_string(), json!(user_id));

        let task = self
            .transition(task_id, TaskStatus::Assigned, patch, "task.assign")
            .await
            .map_err(|e| self.fail(e))?;

        self.notifications
            .success("Task assigned", "The task has been assigned successfully");
        Ok(task)
    }

    pub async fn start_task(&self, task_id: Uuid) -> Result<Task, ServiceError> {
        let task = self
            .transition(task_id, TaskStatus::InProgress, Map::new(), "task.start")
            .await
            .map_err(|e| self.fail(e))?;

        self.notifications.success("Task started", "Work on the task has begun");
        Ok(task)
    }

    pub async fn complete_task(&self, task_id: Uuid) -> Result<Task, ServiceError> {
        let task = self
            .transition(task_id, TaskStatus::Completed, Map::new(), "task.complete")
            .await
            .map_err(|e| self.fail(e))?;

        self.notifications
            .success("Task completed", "The task has been marked as completed");
        Ok(task)
    }

    pub async fn cancel_task(&self, task_id: Uuid) -> Result<Task, ServiceError> {
        let task = self
            .transition(task_id, TaskStatus::Cancelled, Map::new(), "task.cancel")
            .await
            .map_err(|e| self.fail(e))?;

        self.notifications.success("Task cancelled", "The task has been cancelled");
        Ok(task)
    }

    /// Checks `current -> next` against the transition table, then writes
    /// conditionally on the observed status. Nothing is written on an illegal
    /// transition.
    async fn transition(
        &self,
        task_id: Uuid,
        next: TaskStatus,
        mut patch: Map<String, Value>,
        mutation: &str,
    ) -> Result<Task, ServiceError> {
        let current = self.fetch(task_id).await?;

        if !current.status.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition {
                task_id,
                from: current.status,
                to: next,
            });
        }

        patch.insert("status".to_string(), json!(next));
        patch.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self
            .db_client
            .update_task_if_status(task_id, current.status, Value::Object(patch))
            .await?;

        match updated {
            Some(task) => {
                self.db_client.invalidate(mutation, Some(task_id)).await;
                tracing::info!("Task {} moved {} -> {}", task_id, current.status, next);
                Ok(task)
            }
            None => {
                // Status changed (or the row vanished) between read and write.
                self.fetch(task_id).await?;
                Err(ServiceError::Conflict(task_id))
            }
        }
    }

    pub async fn task_bids(&self, task_id: Uuid) -> Result<Vec<Bid>, ServiceError> {
        self.db_client
            .get_task_bids(task_id)
            .await
            .map_err(|e| self.fail(e))
    }

    pub async fn user_reviews(&self, user_id: Uuid) -> Result<Vec<Review>, ServiceError> {
        self.db_client
            .get_user_reviews(user_id)
            .await
            .map_err(|e| self.fail(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::categorydb::CategoryExt,
        models::categorymodel::Category,
        test_utils::TestContext,
    };

    fn new_task(title: &str) -> CreateTaskDto {
        CreateTaskDto {
            title: title.to_string(),
            description: "Needs doing before the weekend".to_string(),
            budget: 5000.0,
            ..Default::default()
        }
    }

    async fn signed_in() -> (TestContext, TaskService, Uuid) {
        let ctx = TestContext::new().await;
        let user_id = ctx.register("owner@hustlr.ng", 0.0).await;
        ctx.sign_in("owner@hustlr.ng").await;
        let service = ctx.task_service();
        (ctx, service, user_id)
    }

    async fn category_count(ctx: &TestContext, id: Uuid) -> i64 {
        let category: Option<Category> = ctx.db_client.get_category(id).await.unwrap();
        category.map(|c| c.task_count).unwrap_or_default()
    }

    fn count_calls(calls: &[String], key: &str) -> usize {
        calls.iter().filter(|c| c.as_str() == key).count()
    }

    #[tokio::test]
    async fn test_create_then_get_is_open_and_owned() {
        let (_ctx, service, owner) = signed_in().await;

        let created = service.create_task(new_task("Fix my sink")).await.unwrap();
        let fetched = service.get_task(created.id).await.unwrap();

        assert_eq!(fetched.status, TaskStatus::Open);
        assert_eq!(fetched.owner_id, owner);
        assert_eq!(fetched.updated_at, fetched.created_at);
        assert!(fetched.assigned_to.is_none());
    }

    #[tokio::test]
    async fn test_create_requires_sign_in() {
        let ctx = TestContext::new().await;
        let service = ctx.task_service();

        let err = service.create_task(new_task("Fix my sink")).await.unwrap_err();

        assert!(matches!(err, ServiceError::Auth(ref m) if m == "You must be logged in to create a task"));
        assert!(ctx.gateway.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_validates_before_writing() {
        let (ctx, service, _) = signed_in().await;
        let mut body = new_task("Fix my sink");
        body.budget = 0.0;

        let err = service.create_task(body).await.unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(count_calls(&ctx.gateway.calls().await, "rpc:create_task"), 0);
    }

    #[tokio::test]
    async fn test_list_tasks_applies_every_filter_newest_first() {
        let (ctx, service, owner) = signed_in().await;
        let category = ctx.seed_category("Cleaning").await;

        let mut remote = new_task("Clean the office");
        remote.is_remote = true;
        remote.category_id = Some(category);
        service.create_task(remote).await.unwrap();

        let mut local = new_task("Clean my flat");
        local.category_id = Some(category);
        service.create_task(local).await.unwrap();

        let mut other = new_task("CLEAN windows");
        other.category_id = Some(category);
        service.create_task(other).await.unwrap();

        service.create_task(new_task("Move boxes")).await.unwrap();

        let found = service
            .list_tasks(TaskFilters {
                category_id: Some(category),
                is_remote: Some(false),
                owner_id: Some(owner),
                search: Some("clean".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let titles: Vec<&str> = found.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["CLEAN windows", "Clean my flat"]);
        assert!(found.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let none = service
            .list_tasks(TaskFilters { status: Some(TaskStatus::Completed), ..Default::default() })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_refetched_after_mutation() {
        let (_ctx, service, _) = signed_in().await;

        assert!(service.list_tasks(TaskFilters::default()).await.unwrap().is_empty());
        service.create_task(new_task("Fix my sink")).await.unwrap();

        assert_eq!(service.list_tasks(TaskFilters::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_task_is_not_found() {
        let (_ctx, service, _) = signed_in().await;
        let err = service.get_task(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_lifecycle_follows_transition_table() {
        let (_ctx, service, _) = signed_in().await;
        let worker = Uuid::new_v4();
        let task = service.create_task(new_task("Paint the fence")).await.unwrap();

        let assigned = service.assign_task(task.id, worker).await.unwrap();
        assert_eq!(assigned.status, TaskStatus::Assigned);
        assert_eq!(assigned.assigned_to, Some(worker));

        assert_eq!(service.start_task(task.id).await.unwrap().status, TaskStatus::InProgress);
        assert_eq!(service.complete_task(task.id).await.unwrap().status, TaskStatus::Completed);

        let fetched = service.get_task(task.id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Completed);
        assert_eq!(fetched.assigned_to, Some(worker));

        let err = service.cancel_task(task.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidTransition { from: TaskStatus::Completed, to: TaskStatus::Cancelled, .. }
        ));
    }

    #[tokio::test]
    async fn test_assign_only_from_open_and_without_write() {
        let (ctx, service, _) = signed_in().await;
        let task = service.create_task(new_task("Paint the fence")).await.unwrap();
        service.assign_task(task.id, Uuid::new_v4()).await.unwrap();
        let writes_before = count_calls(&ctx.gateway.calls().await, "update:tasks");

        let err = service.assign_task(task.id, Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, ServiceError::InvalidTransition { from: TaskStatus::Assigned, .. }));
        assert_eq!(count_calls(&ctx.gateway.calls().await, "update:tasks"), writes_before);
    }

    #[tokio::test]
    async fn test_complete_from_open_is_rejected() {
        let (_ctx, service, _) = signed_in().await;
        let task = service.create_task(new_task("Paint the fence")).await.unwrap();

        let err = service.complete_task(task.id).await.unwrap_err();

        assert!(matches!(err, ServiceError::InvalidTransition { from: TaskStatus::Open, to: TaskStatus::Completed, .. }));
        assert_eq!(service.get_task(task.id).await.unwrap().status, TaskStatus::Open);
    }

    #[tokio::test]
    async fn test_cancel_from_open() {
        let (_ctx, service, _) = signed_in().await;
        let task = service.create_task(new_task("Paint the fence")).await.unwrap();
        assert_eq!(service.cancel_task(task.id).await.unwrap().status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_update_task_patches_fields_and_checks_status() {
        let (_ctx, service, _) = signed_in().await;
        let task = service.create_task(new_task("Paint the fence")).await.unwrap();

        let updated = service
            .update_task(task.id, UpdateTaskDto { budget: Some(7500.0), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.budget, 7500.0);
        assert!(updated.updated_at > task.updated_at);
        assert_eq!(service.get_task(task.id).await.unwrap().budget, 7500.0);

        let err = service
            .update_task(
                task.id,
                UpdateTaskDto { status: Some(TaskStatus::Completed), ..Default::default() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));

        let cancelled = service
            .update_task(
                task.id,
                UpdateTaskDto { status: Some(TaskStatus::Cancelled), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_update_missing_task_is_not_found() {
        let (_ctx, service, _) = signed_in().await;
        let err = service
            .update_task(Uuid::new_v4(), UpdateTaskDto { title: Some("New title".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_conditional_write_misses_after_status_change() {
        let (ctx, service, _) = signed_in().await;
        let task = service.create_task(new_task("Paint the fence")).await.unwrap();
        service.cancel_task(task.id).await.unwrap();

        let stale = ctx
            .db_client
            .update_task_if_status(task.id, TaskStatus::Open, json!({ "status": "assigned" }))
            .await
            .unwrap();

        assert!(stale.is_none());
        assert_eq!(service.get_task(task.id).await.unwrap().status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_category_count_tracks_live_tasks() {
        let (ctx, service, _) = signed_in().await;
        let category = ctx.seed_category("Errands").await;

        let mut created = Vec::new();
        for i in 0..4 {
            let mut body = new_task(&format!("Errand {}", i));
            body.category_id = Some(category);
            created.push(service.create_task(body).await.unwrap());
        }
        for task in created.iter().take(3) {
            service.delete_task(task.id).await.unwrap();
        }

        assert_eq!(category_count(&ctx, category).await, 1);
    }

    #[tokio::test]
    async fn test_category_change_moves_count_with_the_task() {
        let (ctx, service, _) = signed_in().await;
        let errands = ctx.seed_category("Errands").await;
        let cleaning = ctx.seed_category("Cleaning").await;
        let mut body = new_task("Errand");
        body.category_id = Some(errands);
        let task = service.create_task(body).await.unwrap();

        let moved = service
            .update_task(
                task.id,
                UpdateTaskDto { category_id: Some(cleaning), ..Default::default() },
            )
            .await
            .unwrap();

        assert_eq!(moved.category_id, Some(cleaning));
        assert_eq!(category_count(&ctx, errands).await, 0);
        assert_eq!(category_count(&ctx, cleaning).await, 1);
        assert_eq!(count_calls(&ctx.gateway.calls().await, "rpc:reassign_task_category"), 1);

        service.delete_task(task.id).await.unwrap();
        assert_eq!(category_count(&ctx, errands).await, 0);
        assert_eq!(category_count(&ctx, cleaning).await, 0);
    }

    #[tokio::test]
    async fn test_failed_procedure_changes_neither_row_nor_count() {
        let (ctx, service, _) = signed_in().await;
        let category = ctx.seed_category("Errands").await;
        let mut body = new_task("Errand");
        body.category_id = Some(category);
        let kept = service.create_task(body.clone()).await.unwrap();

        ctx.gateway.fail_on("rpc:create_task").await;
        assert!(matches!(service.create_task(body).await, Err(ServiceError::Gateway(_))));

        ctx.gateway.fail_on("rpc:delete_task").await;
        assert!(service.delete_task(kept.id).await.is_err());

        assert_eq!(ctx.gateway.rows("tasks").await.len(), 1);
        assert_eq!(category_count(&ctx, category).await, 1);
    }

    #[tokio::test]
    async fn test_delete_missing_task_is_not_found() {
        let (_ctx, service, _) = signed_in().await;
        let err = service.delete_task(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_task_bids_newest_first() {
        let (ctx, service, _) = signed_in().await;
        let task = service.create_task(new_task("Paint the fence")).await.unwrap();
        let bid = |amount: f64, at: &str| {
            json!({
                "id": Uuid::new_v4(),
                "task_id": task.id,
                "user_id": Uuid::new_v4(),
                "amount": amount,
                "proposal": "I can do it",
                "status": "pending",
                "created_at": at,
            })
        };
        ctx.gateway
            .seed("bids", vec![bid(4000.0, "2026-10-01T08:00:00Z"), bid(4500.0, "2026-10-02T08:00:00Z")])
            .await;

        let bids = service.task_bids(task.id).await.unwrap();
        assert_eq!(bids.iter().map(|b| b.amount).collect::<Vec<_>>(), vec![4500.0, 4000.0]);
        assert!(service.user_reviews(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
