pub mod database;
pub mod registry_store;
pub mod token_repository;

pub use database::Database;
pub use registry_store::SqliteRegistryStore;
pub use token_repository::UserTokenRepository;
