pub mod admin_service;
pub mod auth;
pub mod batch_service;
pub mod notification_service;
pub mod procurement_service;
pub mod side_effects;
pub mod transport_service;
pub mod warehouse_service;
