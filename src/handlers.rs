pub mod admin;
pub mod batches;
pub mod extract;
pub mod notifications;
pub mod procurement;
pub mod registry;
pub mod transport;
pub mod warehouse;
