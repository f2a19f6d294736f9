// db/userdb.rs
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::{
    gateway::{from_row, Filter, GatewayError},
    DBClient,
};
use crate::models::usermodel::{NewProfile, Profile};

pub const PROFILES_TABLE: &str = "profiles";

#[async_trait]
pub trait ProfileExt {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, GatewayError>;

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, GatewayError>;

    /// Partial update; `None` when no profile row has this id.
    async fn update_profile(
        &self,
        user_id: Uuid,
        patch: Value,
    ) -> Result<Option<Profile>, GatewayError>;
}

#[async_trait]
impl ProfileExt for DBClient {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, GatewayError> {
        self.gateway
            .get_by_id(PROFILES_TABLE, user_id)
            .await?
            .map(from_row)
            .transpose()
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, GatewayError> {
        let row = self
            .gateway
            .insert(PROFILES_TABLE, serde_json::to_value(profile)?)
            .await?;
        from_row(row)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        patch: Value,
    ) -> Result<Option<Profile>, GatewayError> {
        self.gateway
            .update(PROFILES_TABLE, &[Filter::eq("id", user_id)], patch)
            .await?
            .into_iter()
            .next()
            .map(from_row)
            .transpose()
    }
}
