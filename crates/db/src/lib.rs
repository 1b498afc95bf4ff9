pub mod connection;
pub mod repositories;
pub mod store;

pub use connection::{connect, connect_with_settings, SnapshotHandle};
pub use repositories::{
    InMemorySnapshotRepository, JsonFileSnapshotRepository, RepositoryError, SnapshotRepository,
};
pub use store::CatalogStore;
