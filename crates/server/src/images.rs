//! Image asset collaborators: turn an uploaded product image into a durable
//! URL before the product write reaches the catalog store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use catalog_core::config::{AppConfig, ImageProvider};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl ImageUpload {
    fn extension(&self) -> &str {
        let from_content_type = self.content_type.as_deref().and_then(|content_type| {
            match content_type.trim().to_ascii_lowercase().as_str() {
                "image/png" => Some("png"),
                "image/jpeg" | "image/jpg" => Some("jpg"),
                "image/gif" => Some("gif"),
                "image/webp" => Some("webp"),
                "image/svg+xml" => Some("svg"),
                _ => None,
            }
        });

        from_content_type
            .or_else(|| {
                self.file_name
                    .as_deref()
                    .and_then(|name| Path::new(name).extension())
                    .and_then(|extension| extension.to_str())
                    .filter(|extension| {
                        !extension.is_empty()
                            && extension.chars().all(|ch| ch.is_ascii_alphanumeric())
                    })
            })
            .unwrap_or("img")
    }

    fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or("application/octet-stream")
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not store image at `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image host request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("image host rejected the upload with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("image host response did not include an image url")]
    MissingUrl,
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Stores the image and returns the URL it can be fetched from.
    async fn upload(&self, image: ImageUpload) -> Result<String, UploadError>;
}

/// Writes images into a directory that the server itself exposes under
/// `/images`.
#[derive(Clone, Debug)]
pub struct LocalImageUploader {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalImageUploader {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self { dir: dir.into(), public_base_url }
    }
}

#[async_trait]
impl ImageUploader for LocalImageUploader {
    async fn upload(&self, image: ImageUpload) -> Result<String, UploadError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| UploadError::Io { path: self.dir.clone(), source })?;

        let file_name = format!("{}.{}", Uuid::new_v4().simple(), image.extension());
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(|source| UploadError::Io { path: path.clone(), source })?;

        info!(
            event_name = "catalog.image.stored",
            provider = "local",
            file_name = %file_name,
            bytes = image.bytes.len(),
            "product image stored locally"
        );
        Ok(format!("{}/images/{file_name}", self.public_base_url))
    }
}

/// Unsigned upload to a Cloudinary-compatible asset host.
#[derive(Clone)]
pub struct CloudinaryUploader {
    client: Client,
    upload_url: String,
    upload_preset: String,
    folder: String,
    api_token: Option<SecretString>,
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    file: &'a str,
    upload_preset: &'a str,
    folder: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

impl CloudinaryUploader {
    pub fn new(
        upload_url: impl Into<String>,
        upload_preset: impl Into<String>,
        folder: impl Into<String>,
        api_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            upload_url: upload_url.into(),
            upload_preset: upload_preset.into(),
            folder: folder.into(),
            api_token,
        })
    }
}

#[async_trait]
impl ImageUploader for CloudinaryUploader {
    async fn upload(&self, image: ImageUpload) -> Result<String, UploadError> {
        let data_uri = format!("data:{};base64,{}", image.content_type(), STANDARD.encode(&image.bytes));
        let payload = UploadRequest {
            file: &data_uri,
            upload_preset: &self.upload_preset,
            folder: &self.folder,
        };

        let mut request = self.client.post(&self.upload_url).json(&payload);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected { status: status.as_u16(), body });
        }

        let uploaded: UploadResponse = response.json().await?;
        let url = uploaded
            .secure_url
            .or(uploaded.url)
            .filter(|url| !url.trim().is_empty())
            .ok_or(UploadError::MissingUrl)?;

        info!(
            event_name = "catalog.image.uploaded",
            provider = "cloudinary",
            folder = %self.folder,
            bytes = image.bytes.len(),
            "product image uploaded to asset host"
        );
        Ok(url)
    }
}

pub fn build_uploader(config: &AppConfig) -> Result<Arc<dyn ImageUploader>, reqwest::Error> {
    let images = &config.images;
    match images.provider {
        ImageProvider::Local => Ok(Arc::new(LocalImageUploader::new(
            images.local_dir.clone(),
            config.server.public_base_url(),
        ))),
        ImageProvider::Cloudinary => Ok(Arc::new(CloudinaryUploader::new(
            images.upload_url.clone().unwrap_or_default(),
            images.upload_preset.clone().unwrap_or_default(),
            images.folder.clone(),
            images.api_token.clone(),
            Duration::from_secs(images.timeout_secs),
        )?)),
    }
}
