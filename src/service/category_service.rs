// service/category_service.rs
use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{
        cache::{keys, CATEGORY_CACHE_TTL},
        categorydb::CategoryExt,
        DBClient,
    },
    dtos::categorydtos::{CreateCategoryDto, UpdateCategoryDto},
    models::categorymodel::Category,
    service::{error::ServiceError, notification_service::NotificationService},
};

#[derive(Debug, Clone)]
pub struct CategoryService {
    db_client: Arc<DBClient>,
    notifications: NotificationService,
}

impl CategoryService {
    pub fn new(db_client: Arc<DBClient>, notifications: NotificationService) -> Self {
        Self {
            db_client,
            notifications,
        }
    }

    fn fail(&self, error: impl Into<ServiceError>) -> ServiceError {
        self.notifications.failure("Error", error.into())
    }

    /// All categories by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        let key = keys::categories();
        if let Some(categories) = self.db_client.cache.get::<Vec<Category>>(&key).await {
            return Ok(categories);
        }

        let categories = self
            .db_client
            .get_categories()
            .await
            .map_err(|e| self.fail(e))?;
        self.db_client
            .cache
            .set(&key, &categories, CATEGORY_CACHE_TTL)
            .await;
        Ok(categories)
    }

    pub async fn create_category(&self, body: CreateCategoryDto) -> Result<Category, ServiceError> {
        body.validate().map_err(|e| self.fail(e))?;

        let category = self
            .db_client
            .create_category(body)
            .await
            .map_err(|e| self.fail(e))?;

        self.db_client.invalidate("category.create", Some(category.id)).await;
        self.notifications
            .success("Category created", format!("{} is now available", category.name));
        Ok(category)
    }

    pub async fn update_category(
        &self,
        category_id: Uuid,
        body: UpdateCategoryDto,
    ) -> Result<Category, ServiceError> {
        body.validate().map_err(|e| self.fail(e))?;

        let patch = serde_json::to_value(&body)
            .map_err(|e| self.fail(ServiceError::Validation(e.to_string())))?;
        let category = self
            .db_client
            .update_category(category_id, patch)
            .await
            .map_err(ServiceError::from)
            .and_then(|c| c.ok_or_else(|| ServiceError::NotFound("Category not found".to_string())))
            .map_err(|e| self.fail(e))?;

        self.db_client.invalidate("category.update", Some(category_id)).await;
        self.notifications
            .success("Category updated", "The category has been updated successfully");
        Ok(category)
    }

    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), ServiceError> {
        self.db_client
            .delete_category(category_id)
            .await
            .map_err(|e| self.fail(e))?;

        self.db_client.invalidate("category.delete", Some(category_id)).await;
        self.notifications
            .success("Category deleted", "The category has been deleted successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestContext;

    fn body(name: &str) -> CreateCategoryDto {
        CreateCategoryDto {
            name: name.to_string(),
            slug: name.to_lowercase(),
            icon: "wrench".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_at_zero_and_lists_by_name() {
        let ctx = TestContext::new().await;
        let service = ctx.category_service();

        let created = service.create_category(body("Plumbing")).await.unwrap();
        service.create_category(body("Errands")).await.unwrap();

        assert_eq!(created.task_count, 0);
        let names: Vec<String> = service
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Errands", "Plumbing"]);
    }

    #[tokio::test]
    async fn test_list_is_cached_until_a_mutation() {
        let ctx = TestContext::new().await;
        let service = ctx.category_service();
        service.create_category(body("Plumbing")).await.unwrap();

        assert_eq!(service.list_categories().await.unwrap().len(), 1);
        ctx.gateway.fail_on("query:categories").await;
        assert_eq!(service.list_categories().await.unwrap().len(), 1);
        ctx.gateway.clear_failures().await;

        service.create_category(body("Errands")).await.unwrap();
        assert_eq!(service.list_categories().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_category_is_not_found() {
        let ctx = TestContext::new().await;
        let err = ctx
            .category_service()
            .update_category(
                Uuid::new_v4(),
                UpdateCategoryDto { name: Some("Gardening".into()), ..Default::default() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let ctx = TestContext::new().await;
        let service = ctx.category_service();
        let created = service.create_category(body("Plumbing")).await.unwrap();

        let renamed = service
            .update_category(
                created.id,
                UpdateCategoryDto { icon: Some("pipe".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(renamed.icon, "pipe");
        assert_eq!(renamed.name, "Plumbing");

        service.delete_category(created.id).await.unwrap();
        assert!(service.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_body_is_rejected_before_writing() {
        let ctx = TestContext::new().await;
        let err = ctx
            .category_service()
            .create_category(CreateCategoryDto { name: "".into(), slug: "x".into(), icon: "x".into() })
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Validation(ref m) if m == "Name is required"));
        assert!(ctx.gateway.calls().await.is_empty());
    }
}
