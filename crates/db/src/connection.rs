use std::path::Path;
use std::sync::Arc;

use catalog_core::config::{StorageBackend, StorageConfig};

use crate::repositories::{
    InMemorySnapshotRepository, JsonFileSnapshotRepository, SnapshotRepository,
};

pub type SnapshotHandle = Arc<dyn SnapshotRepository>;

pub fn connect(path: impl AsRef<Path>) -> SnapshotHandle {
    Arc::new(JsonFileSnapshotRepository::new(path.as_ref()))
}

pub fn connect_with_settings(storage: &StorageConfig) -> SnapshotHandle {
    match storage.backend {
        StorageBackend::File => connect(&storage.path),
        StorageBackend::Memory => Arc::new(InMemorySnapshotRepository::default()),
    }
}
