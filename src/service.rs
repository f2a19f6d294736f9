pub mod category_service;
pub mod error;
pub mod notification_service;
pub mod payment_provider;
pub mod session_service;
pub mod task_service;
pub mod wallet_service;
