pub mod activity;
pub mod auth;
pub mod batch;
pub mod notification;
pub mod profile;
pub mod registry;
pub mod status;
pub mod transport;
