//! Database layer for the lab request portal.
//!
//! SQLite through SQLx. One repository per entity, each behind an
//! `async_trait` so handlers only see `Box<dyn ...Repository>`.

mod convert;
mod error;
mod pagination;
mod pool;
mod schema;

pub mod backup_repo;
pub mod capability_repo;
pub mod equipment_repo;
pub mod io_repo;
pub mod location_repo;
pub mod request_repo;
pub mod sample_repo;
pub mod test_method_repo;
pub mod user_repo;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::DbError;
pub use pagination::{PaginatedResult, Pagination, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use pool::{
    create_memory_pool, create_pool, create_pool_with_options, escape_like_pattern,
    make_like_pattern, DbPool, PoolOptions, WriteTransaction,
};
pub use schema::run_migrations;

// Repository traits and types
pub use backup_repo::{Backup, BackupRepository, RestoreSummary, BACKUP_FORMAT_VERSION};
pub use capability_repo::CapabilityRepository;
pub use equipment_repo::EquipmentRepository;
pub use io_repo::IoRepository;
pub use location_repo::LocationRepository;
pub use request_repo::RequestRepository;
pub use sample_repo::SampleRepository;
pub use test_method_repo::TestMethodRepository;
pub use user_repo::UserRepository;

// Factory functions
pub use backup_repo::create_backup_repository;
pub use capability_repo::create_capability_repository;
pub use equipment_repo::create_equipment_repository;
pub use io_repo::create_io_repository;
pub use location_repo::create_location_repository;
pub use request_repo::create_request_repository;
pub use sample_repo::create_sample_repository;
pub use test_method_repo::create_test_method_repository;
pub use user_repo::create_user_repository;
