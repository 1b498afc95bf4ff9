use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use catalog_core::domain::product::Product;

use super::{RepositoryError, SnapshotRepository};

/// Keeps the snapshot as a pretty-printed JSON array in a single file.
///
/// Saves go to a sibling temporary file that is then renamed over the target,
/// so a concurrent `load` sees either the previous or the new snapshot.
#[derive(Clone, Debug)]
pub struct JsonFileSnapshotRepository {
    path: PathBuf,
}

impl JsonFileSnapshotRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn staging_path(&self) -> PathBuf {
        let mut file_name =
            self.path.file_name().map(OsString::from).unwrap_or_else(|| OsString::from("snapshot"));
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> RepositoryError {
        RepositoryError::Io { path: path.to_path_buf(), source }
    }
}

#[async_trait]
impl SnapshotRepository for JsonFileSnapshotRepository {
    async fn load(&self) -> Result<Vec<Product>, RepositoryError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(
                    event_name = "catalog.snapshot.bootstrap",
                    path = %self.path.display(),
                    "no snapshot on disk yet, starting empty"
                );
                return Ok(Vec::new());
            }
            Err(source) => return Err(self.io_error(&self.path, source)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|error| {
            RepositoryError::Decode(format!("{}: {error}", self.path.display()))
        })
    }

    async fn save(&self, products: &[Product]) -> Result<(), RepositoryError> {
        let encoded = serde_json::to_vec_pretty(products)
            .map_err(|error| RepositoryError::Encode(error.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(parent, source))?;
        }

        let staging = self.staging_path();
        tokio::fs::write(&staging, &encoded).await.map_err(|source| self.io_error(&staging, source))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|source| self.io_error(&self.path, source))?;

        debug!(
            event_name = "catalog.snapshot.saved",
            path = %self.path.display(),
            product_count = products.len(),
            bytes = encoded.len(),
            "snapshot written"
        );
        Ok(())
    }
}
