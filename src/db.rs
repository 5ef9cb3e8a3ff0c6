pub mod batch_repo;
pub use batch_repo::BatchRepository;
pub mod transport_repo;
pub use transport_repo::TransportRepository;
pub mod profile_repo;
pub use profile_repo::ProfileRepository;
pub mod registry_repo;
pub use registry_repo::RegistryRepository;
pub mod notification_repo;
pub use notification_repo::NotificationRepository;
pub mod activity_repo;
pub use activity_repo::ActivityRepository;
