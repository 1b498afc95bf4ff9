use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use catalog_db::SnapshotHandle;
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    repository: SnapshotHandle,
}

impl HealthState {
    pub fn new(repository: SnapshotHandle) -> Self {
        Self { repository }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub storage: HealthCheck,
    pub checked_at: String,
}

pub fn router(repository: SnapshotHandle) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState::new(repository))
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = storage_check(&state.repository).await;
    let ready = storage.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "catalog-server runtime initialized".to_string(),
        },
        storage,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn storage_check(repository: &SnapshotHandle) -> HealthCheck {
    match repository.load().await {
        Ok(products) => HealthCheck {
            status: "ready",
            detail: format!("snapshot readable with {} product(s)", products.len()),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("snapshot load failed: {error}") }
        }
    }
}
