//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: StoreHealth,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct StoreHealth {
    pub backend: &'static str,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<usize>,
}

/// Health check endpoint - returns server and store status.
///
/// GET /health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let reachable = state.store.is_reachable().await;

    let response = HealthResponse {
        status: if reachable { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        store: StoreHealth {
            backend: state.store.backend(),
            reachable,
            keys: state.store.key_count().await,
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    HttpResponse::Ok().json(response)
}
