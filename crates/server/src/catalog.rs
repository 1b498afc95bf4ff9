//! HTTP routes for the product catalog and nested reviews.
//!
//! Products live under `/products/{product_id}`; reviews nest under
//! `/products/{product_id}/reviews/{review_id}`. Product writes take a
//! multipart form with an optional `product_image` file part, review writes
//! take JSON.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use catalog_core::domain::product::{Product, ProductId, ProductPatch};
use catalog_core::domain::review::{Review, ReviewId, ReviewPatch};
use catalog_core::errors::{ApplicationError, DomainError, InterfaceError};
use catalog_core::validation::{FieldError, ProductInput, ReviewInput};
use catalog_db::CatalogStore;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::images::{ImageUpload, ImageUploader};

const PRODUCT_IMAGE_FIELD: &str = "product_image";
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct CatalogState {
    store: Arc<CatalogStore>,
    uploader: Arc<dyn ImageUploader>,
    max_image_bytes: usize,
}

impl CatalogState {
    pub fn new(
        store: Arc<CatalogStore>,
        uploader: Arc<dyn ImageUploader>,
        max_image_bytes: usize,
    ) -> Self {
        Self { store, uploader, max_image_bytes }
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
    pub correlation_id: String,
}

/// Transport-level rendering of an [`InterfaceError`].
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        let message = match &self.0 {
            InterfaceError::BadRequest { message, .. } | InterfaceError::NotFound { message, .. } => {
                message.clone()
            }
            other => other.user_message().to_string(),
        };
        let body = ErrorBody {
            error: message,
            details: self.0.details().to_vec(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

struct ProductForm {
    input: ProductInput,
    image: Option<ImageUpload>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: CatalogState) -> Router {
    let body_limit = state.max_image_bytes.saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{product_id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/{product_id}/reviews", get(list_reviews).post(create_review))
        .route(
            "/products/{product_id}/reviews/{review_id}",
            get(get_review).put(update_review).delete(delete_review),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Product handlers
// ---------------------------------------------------------------------------

async fn list_products(
    State(state): State<CatalogState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let correlation_id = correlation_id();
    let category = query.category.as_deref().filter(|category| !category.is_empty());

    let products =
        state.store.list_products(category).await.map_err(|error| reject(error, &correlation_id))?;
    Ok(Json(products))
}

async fn get_product(
    Path(product_id): Path<String>,
    State(state): State<CatalogState>,
) -> Result<Json<Product>, ApiError> {
    let correlation_id = correlation_id();

    let product = state
        .store
        .get_product(&ProductId(product_id))
        .await
        .map_err(|error| reject(error, &correlation_id))?;
    Ok(Json(product))
}

async fn create_product(
    State(state): State<CatalogState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let correlation_id = correlation_id();
    let form = read_product_form(multipart, state.max_image_bytes, &correlation_id).await?;

    let fields = form.input.validate().map_err(|errors| invalid(errors, &correlation_id))?;
    let image = form.image.ok_or_else(|| {
        invalid(
            vec![FieldError {
                field: PRODUCT_IMAGE_FIELD.to_string(),
                message: "Product image is required!".to_string(),
            }],
            &correlation_id,
        )
    })?;
    let image_url = upload_image(&state, image, &correlation_id).await?;

    let product = state
        .store
        .create_product(fields, image_url)
        .await
        .map_err(|error| reject(error, &correlation_id))?;

    info!(
        event_name = "catalog.product.created",
        correlation_id = %correlation_id,
        product_id = %product.id,
        "product created"
    );
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    Path(product_id): Path<String>,
    State(state): State<CatalogState>,
    multipart: Multipart,
) -> Result<Json<Vec<Product>>, ApiError> {
    let correlation_id = correlation_id();
    let product_id = ProductId(product_id);
    let form = read_product_form(multipart, state.max_image_bytes, &correlation_id).await?;

    let fields = form.input.validate().map_err(|errors| invalid(errors, &correlation_id))?;
    let image_url = match form.image {
        Some(image) => {
            // Avoid pushing an orphan image for a product that does not exist.
            // A delete racing between this check and the update still orphans
            // the upload and yields 404; the snapshot stays consistent.
            state
                .store
                .get_product(&product_id)
                .await
                .map_err(|error| reject(error, &correlation_id))?;
            Some(upload_image(&state, image, &correlation_id).await?)
        }
        None => None,
    };

    let products = state
        .store
        .update_product(&product_id, ProductPatch::from(fields), image_url)
        .await
        .map_err(|error| reject(error, &correlation_id))?;

    info!(
        event_name = "catalog.product.updated",
        correlation_id = %correlation_id,
        product_id = %product_id,
        "product updated"
    );
    Ok(Json(products))
}

async fn delete_product(
    Path(product_id): Path<String>,
    State(state): State<CatalogState>,
) -> Result<StatusCode, ApiError> {
    let correlation_id = correlation_id();
    let product_id = ProductId(product_id);

    state.store.delete_product(&product_id).await.map_err(|error| reject(error, &correlation_id))?;

    info!(
        event_name = "catalog.product.deleted",
        correlation_id = %correlation_id,
        product_id = %product_id,
        "product deleted with its reviews"
    );
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Review handlers
// ---------------------------------------------------------------------------

async fn list_reviews(
    Path(product_id): Path<String>,
    State(state): State<CatalogState>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let correlation_id = correlation_id();

    let reviews = state
        .store
        .list_reviews(&ProductId(product_id))
        .await
        .map_err(|error| reject(error, &correlation_id))?;
    Ok(Json(reviews))
}

async fn get_review(
    Path((product_id, review_id)): Path<(String, String)>,
    State(state): State<CatalogState>,
) -> Result<Json<Review>, ApiError> {
    let correlation_id = correlation_id();

    let review = state
        .store
        .get_review(&ProductId(product_id), &ReviewId(review_id))
        .await
        .map_err(|error| reject(error, &correlation_id))?;
    Ok(Json(review))
}

async fn create_review(
    Path(product_id): Path<String>,
    State(state): State<CatalogState>,
    body: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<Product>>), ApiError> {
    let correlation_id = correlation_id();
    let product_id = ProductId(product_id);
    let Json(input) = body.map_err(|rejection| malformed_json(rejection, &correlation_id))?;

    let fields = input.validate().map_err(|errors| invalid(errors, &correlation_id))?;
    let products = state
        .store
        .create_review(&product_id, fields)
        .await
        .map_err(|error| reject(error, &correlation_id))?;

    info!(
        event_name = "catalog.review.created",
        correlation_id = %correlation_id,
        product_id = %product_id,
        "review created"
    );
    Ok((StatusCode::CREATED, Json(products)))
}

async fn update_review(
    Path((product_id, review_id)): Path<(String, String)>,
    State(state): State<CatalogState>,
    body: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let correlation_id = correlation_id();
    let product_id = ProductId(product_id);
    let review_id = ReviewId(review_id);
    let Json(input) = body.map_err(|rejection| malformed_json(rejection, &correlation_id))?;

    let fields = input.validate().map_err(|errors| invalid(errors, &correlation_id))?;
    let products = state
        .store
        .update_review(&product_id, &review_id, ReviewPatch::from(fields))
        .await
        .map_err(|error| reject(error, &correlation_id))?;

    info!(
        event_name = "catalog.review.updated",
        correlation_id = %correlation_id,
        product_id = %product_id,
        review_id = %review_id,
        "review updated"
    );
    Ok(Json(products))
}

async fn delete_review(
    Path((product_id, review_id)): Path<(String, String)>,
    State(state): State<CatalogState>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let correlation_id = correlation_id();
    let product_id = ProductId(product_id);
    let review_id = ReviewId(review_id);

    let products = state
        .store
        .delete_review(&product_id, &review_id)
        .await
        .map_err(|error| reject(error, &correlation_id))?;

    info!(
        event_name = "catalog.review.deleted",
        correlation_id = %correlation_id,
        product_id = %product_id,
        review_id = %review_id,
        "review deleted"
    );
    Ok(Json(products))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn read_product_form(
    mut multipart: Multipart,
    max_image_bytes: usize,
    correlation_id: &str,
) -> Result<ProductForm, ApiError> {
    let mut input = ProductInput::default();
    let mut image = None;

    while let Some(field) =
        multipart.next_field().await.map_err(|error| malformed_form(error, correlation_id))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == PRODUCT_IMAGE_FIELD {
            let content_type = field.content_type().map(str::to_string);
            let file_name = field.file_name().map(str::to_string);
            if content_type.as_deref().is_some_and(|value| !value.starts_with("image/")) {
                return Err(invalid(
                    vec![FieldError {
                        field: PRODUCT_IMAGE_FIELD.to_string(),
                        message: "Product image must be an image file!".to_string(),
                    }],
                    correlation_id,
                ));
            }

            let bytes =
                field.bytes().await.map_err(|error| malformed_form(error, correlation_id))?;
            if bytes.len() > max_image_bytes {
                return Err(invalid(
                    vec![FieldError {
                        field: PRODUCT_IMAGE_FIELD.to_string(),
                        message: format!("Product image must not exceed {max_image_bytes} bytes!"),
                    }],
                    correlation_id,
                ));
            }
            if !bytes.is_empty() {
                image = Some(ImageUpload { bytes: bytes.to_vec(), content_type, file_name });
            }
            continue;
        }

        let value = field.text().await.map_err(|error| malformed_form(error, correlation_id))?;
        if !input.set(&name, value) {
            warn!(
                event_name = "catalog.form.unknown_field",
                correlation_id = %correlation_id,
                field = %name,
                "ignoring unrecognized product form field"
            );
        }
    }

    Ok(ProductForm { input, image })
}

async fn upload_image(
    state: &CatalogState,
    image: ImageUpload,
    correlation_id: &str,
) -> Result<String, ApiError> {
    state.uploader.upload(image).await.map_err(|error| {
        reject(ApplicationError::Integration(format!("image upload failed: {error}")), correlation_id)
    })
}

fn reject(error: ApplicationError, correlation_id: &str) -> ApiError {
    match &error {
        ApplicationError::Domain(DomainError::Validation(_)) => {}
        ApplicationError::Domain(_) => {
            info!(
                event_name = "catalog.request.not_found",
                correlation_id = %correlation_id,
                error = %error,
                "catalog entity not found"
            );
        }
        ApplicationError::Persistence(_) | ApplicationError::Integration(_) => {
            error!(
                event_name = "catalog.request.failed",
                correlation_id = %correlation_id,
                error = %error,
                "catalog request failed"
            );
        }
    }
    ApiError(error.into_interface(correlation_id))
}

fn invalid(errors: Vec<FieldError>, correlation_id: &str) -> ApiError {
    reject(ApplicationError::from(DomainError::Validation(errors)), correlation_id)
}

fn malformed_form(error: impl std::fmt::Display, correlation_id: &str) -> ApiError {
    ApiError(InterfaceError::bad_request(format!("malformed multipart body: {error}"), correlation_id))
}

fn malformed_json(rejection: JsonRejection, correlation_id: &str) -> ApiError {
    ApiError(InterfaceError::bad_request(
        format!("malformed JSON body: {}", rejection.body_text()),
        correlation_id,
    ))
}

fn correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}
