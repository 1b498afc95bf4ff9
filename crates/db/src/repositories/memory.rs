use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::RwLock;

use catalog_core::domain::product::Product;

use super::{RepositoryError, SnapshotRepository};

/// Snapshot held in process memory. Useful for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    products: RwLock<Vec<Product>>,
    saves: AtomicUsize,
    fail_writes: AtomicBool,
}

impl InMemorySnapshotRepository {
    pub fn with_products(products: Vec<Product>) -> Self {
        Self { products: RwLock::new(products), ..Self::default() }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Makes every following `save` fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn load(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.clone())
    }

    async fn save(&self, products: &[Product]) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("in-memory writes are disabled".to_string()));
        }

        let mut stored = self.products.write().await;
        *stored = products.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
