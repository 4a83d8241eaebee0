use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use trailhead_agent::Engine;
use trailhead_core::catalog::Catalog;

#[derive(Clone)]
pub struct HealthState {
    pub catalog: Arc<Catalog>,
    pub engine: Arc<Engine>,
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
    pub catalog: HealthCheck,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let catalog = catalog_check(&state.catalog);
    let ready = catalog.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("{} tools registered", state.engine.registry().len()),
        },
        catalog,
        active_sessions: state.engine.session_count().await,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn catalog_check(catalog: &Catalog) -> HealthCheck {
    let orders = catalog.orders().len();
    let products = catalog.products().len();
    if orders == 0 || products == 0 {
        return HealthCheck {
            status: "degraded",
            detail: format!("catalog incomplete: {orders} order(s), {products} product(s)"),
        };
    }
    HealthCheck { status: "ready", detail: format!("{orders} order(s), {products} product(s)") }
}
