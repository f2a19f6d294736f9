// db/categorydb.rs
use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{
    gateway::{from_row, from_rows, Filter, GatewayError, Order},
    DBClient,
};
use crate::{dtos::categorydtos::CreateCategoryDto, models::categorymodel::Category};

pub const CATEGORIES_TABLE: &str = "categories";

#[async_trait]
pub trait CategoryExt {
    async fn get_categories(&self) -> Result<Vec<Category>, GatewayError>;

    async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>, GatewayError>;

    async fn create_category(&self, category: CreateCategoryDto) -> Result<Category, GatewayError>;

    async fn update_category(
        &self,
        category_id: Uuid,
        patch: Value,
    ) -> Result<Option<Category>, GatewayError>;

    async fn delete_category(&self, category_id: Uuid) -> Result<(), GatewayError>;
}

#[async_trait]
impl CategoryExt for DBClient {
    async fn get_categories(&self) -> Result<Vec<Category>, GatewayError> {
        let rows = self
            .gateway
            .query(CATEGORIES_TABLE, &[], Some(Order::asc("name")))
            .await?;
        from_rows(rows)
    }

    async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>, GatewayError> {
        self.gateway
            .get_by_id(CATEGORIES_TABLE, category_id)
            .await?
            .map(from_row)
            .transpose()
    }

    async fn create_category(&self, category: CreateCategoryDto) -> Result<Category, GatewayError> {
        let row = json!({
            "name": category.name,
            "slug": category.slug,
            "icon": category.icon,
            "task_count": 0,
        });
        from_row(self.gateway.insert(CATEGORIES_TABLE, row).await?)
    }

    async fn update_category(
        &self,
        category_id: Uuid,
        patch: Value,
    ) -> Result<Option<Category>, GatewayError> {
        self.gateway
            .update(CATEGORIES_TABLE, &[Filter::eq("id", category_id)], patch)
            .await?
            .into_iter()
            .next()
            .map(from_row)
            .transpose()
    }

    async fn delete_category(&self, category_id: Uuid) -> Result<(), GatewayError> {
        self.gateway
            .delete(CATEGORIES_TABLE, &[Filter::eq("id", category_id)])
            .await
    }
}
