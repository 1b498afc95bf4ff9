use std::sync::Arc;

use axum::Router;
use catalog_core::config::{AppConfig, ConfigError, ImageProvider, LoadOptions};
use catalog_core::ids::RandomIdGenerator;
use catalog_db::{connect_with_settings, CatalogStore, RepositoryError, SnapshotHandle};
use thiserror::Error;
use tower_http::services::ServeDir;
use tracing::info;

use crate::catalog::{self, CatalogState};
use crate::health;
use crate::images::{build_uploader, ImageUploader};

pub struct Application {
    pub config: AppConfig,
    pub repository: SnapshotHandle,
    pub store: Arc<CatalogStore>,
    pub uploader: Arc<dyn ImageUploader>,
}

impl Application {
    pub fn router(&self) -> Router {
        let state = CatalogState::new(
            Arc::clone(&self.store),
            Arc::clone(&self.uploader),
            self.config.images.max_bytes,
        );
        let router =
            catalog::router(state).merge(health::router(Arc::clone(&self.repository)));

        match self.config.images.provider {
            ImageProvider::Local => {
                router.nest_service("/images", ServeDir::new(&self.config.images.local_dir))
            }
            ImageProvider::Cloudinary => router,
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("catalog snapshot could not be loaded: {0}")]
    Storage(#[source] RepositoryError),
    #[error("image host client could not be built: {0}")]
    ImageHost(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let repository = connect_with_settings(&config.storage);
    let products = repository.load().await.map_err(BootstrapError::Storage)?;
    info!(
        event_name = "system.bootstrap.snapshot_loaded",
        correlation_id = "bootstrap",
        backend = ?config.storage.backend,
        path = %config.storage.path.display(),
        product_count = products.len(),
        "catalog snapshot is readable"
    );

    let uploader = build_uploader(&config).map_err(BootstrapError::ImageHost)?;
    info!(
        event_name = "system.bootstrap.images_ready",
        correlation_id = "bootstrap",
        provider = ?config.images.provider,
        "image uploader initialized"
    );

    let store = Arc::new(CatalogStore::new(Arc::clone(&repository), Arc::new(RandomIdGenerator)));

    Ok(Application { config, repository, store, uploader })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use catalog_core::config::{
        AppConfig, ConfigOverrides, ImageProvider, LoadOptions, StorageBackend,
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::bootstrap::{bootstrap, bootstrap_with_config, BootstrapError};

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config
    }

    #[tokio::test]
    async fn bootstrap_with_memory_backend_starts_empty() {
        let app = bootstrap_with_config(memory_config()).await.expect("bootstrap should succeed");

        let products = app.store.list_products(None).await.expect("list products");

        assert!(products.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_applies_load_overrides() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                storage_backend: Some(StorageBackend::Memory),
                server_port: Some(4010),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with overrides");

        assert_eq!(app.config.storage.backend, StorageBackend::Memory);
        assert_eq!(app.config.server.port, 4010);
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_corrupt_snapshot() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("products.json");
        std::fs::write(&path, "[{ not json").expect("write corrupt snapshot");
        let mut config = AppConfig::default();
        config.storage.path = path;

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::Storage(_))));
    }

    #[tokio::test]
    async fn bootstrap_rejects_cloudinary_without_upload_url() {
        let mut config = memory_config();
        config.images.provider = ImageProvider::Cloudinary;
        config.images.upload_preset = Some("preset".to_string());

        let result = bootstrap_with_config(config).await;

        assert!(result.is_err());
        let message = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("images.upload_url"));
    }

    #[tokio::test]
    async fn integration_smoke_serves_health_products_and_local_images() {
        let dir = TempDir::new().expect("temp dir");
        let images = dir.path().join("images");
        std::fs::create_dir_all(&images).expect("image dir");
        std::fs::write(images.join("mug.png"), b"png!").expect("image file");
        let mut config = memory_config();
        config.images.local_dir = images;

        let app = bootstrap_with_config(config).await.expect("bootstrap should succeed");
        let router = app.router();

        let health = router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health response");
        assert_eq!(health.status(), StatusCode::OK);

        let products = router
            .clone()
            .oneshot(Request::get("/products").body(Body::empty()).expect("request"))
            .await
            .expect("products response");
        assert_eq!(products.status(), StatusCode::OK);
        let body = to_bytes(products.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&body[..], b"[]");

        let image = router
            .oneshot(Request::get("/images/mug.png").body(Body::empty()).expect("request"))
            .await
            .expect("image response");
        assert_eq!(image.status(), StatusCode::OK);
        let bytes = to_bytes(image.into_body(), usize::MAX).await.expect("image body");
        assert_eq!(&bytes[..], b"png!");
    }
}
