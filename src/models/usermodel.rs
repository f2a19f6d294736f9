use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The domain user record, paired 1:1 with an auth identity.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Naira, never negative
    pub wallet_balance: f64,
    pub rating: f64,
    pub total_tasks_completed: i32,
    pub total_tasks_posted: i32,
    pub is_verified: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Row inserted once at sign-up, with zeroed counters and balance.
#[derive(Debug, Serialize, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub wallet_balance: f64,
    pub rating: f64,
    pub total_tasks_completed: i32,
    pub total_tasks_posted: i32,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewProfile {
    pub fn new(
        id: Uuid,
        email: String,
        first_name: String,
        last_name: String,
        phone_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            first_name,
            last_name,
            phone_number,
            wallet_balance: 0.0,
            rating: 0.0,
            total_tasks_completed: 0,
            total_tasks_posted: 0,
            is_verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}
