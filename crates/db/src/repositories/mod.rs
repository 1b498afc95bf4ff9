use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use catalog_core::domain::product::Product;
use catalog_core::errors::ApplicationError;

pub mod file;
pub mod memory;

pub use file::JsonFileSnapshotRepository;
pub use memory::InMemorySnapshotRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("snapshot io error at `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// Whole-collection persistence. Every save replaces the previous snapshot
/// entirely; there are no partial or append writes.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Reads the full collection. A store that has never been written yields
    /// an empty collection.
    async fn load(&self) -> Result<Vec<Product>, RepositoryError>;

    async fn save(&self, products: &[Product]) -> Result<(), RepositoryError>;
}
