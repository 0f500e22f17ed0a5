//! Ops and observability endpoints.
//!
//! Pacing and proxy snapshots plus administrative resets, and read-only
//! campaign listings. The tenant-facing CRUD/export surface lives in the
//! external API layer, not here.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::pacing::{DomainSnapshot, PacingGovernor};
use crate::proxy::{ProxyPool, ProxySnapshot};
use crate::store::{DocumentStore, FindOptions, SortOrder, CAMPAIGNS, LEADS};

#[derive(Clone)]
pub struct ApiState {
    pub pacing: Arc<PacingGovernor>,
    pub proxies: Arc<ProxyPool>,
    pub store: Arc<dyn DocumentStore>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/pacing", get(pacing_snapshot))
        .route("/api/pacing/:host", get(pacing_host))
        .route("/api/pacing/:host/reset", post(pacing_reset))
        .route("/api/proxies", get(proxy_snapshot))
        .route("/api/proxies/reset", post(proxy_reset))
        .route("/api/campaigns", get(list_campaigns))
        .route("/api/campaigns/:id/leads/count", get(campaign_lead_count))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn pacing_snapshot(State(state): State<ApiState>) -> Json<Vec<DomainSnapshot>> {
    Json(state.pacing.snapshot())
}

async fn pacing_host(
    State(state): State<ApiState>,
    Path(host): Path<String>,
) -> Result<Json<DomainSnapshot>, StatusCode> {
    state
        .pacing
        .stats(&host)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn pacing_reset(State(state): State<ApiState>, Path(host): Path<String>) -> StatusCode {
    state.pacing.reset(&host);
    info!(host = %host, "pacing state reset");
    StatusCode::NO_CONTENT
}

async fn proxy_snapshot(State(state): State<ApiState>) -> Json<Vec<ProxySnapshot>> {
    Json(state.proxies.stats())
}

#[derive(Debug, Deserialize)]
struct ProxyResetQuery {
    url: Option<String>,
}

async fn proxy_reset(
    State(state): State<ApiState>,
    Query(params): Query<ProxyResetQuery>,
) -> StatusCode {
    state.proxies.reset(params.url.as_deref());
    info!("proxy pool reset");
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct CampaignQueryParams {
    tenant_id: Option<String>,
    status: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct CampaignListResponse {
    campaigns: Vec<Value>,
    count: usize,
    timestamp: String,
}

async fn list_campaigns(
    State(state): State<ApiState>,
    Query(params): Query<CampaignQueryParams>,
) -> Result<Json<CampaignListResponse>, StatusCode> {
    let mut filter = serde_json::Map::new();
    if let Some(tenant_id) = params.tenant_id {
        filter.insert("tenantId".to_string(), Value::String(tenant_id));
    }
    if let Some(status) = params.status {
        filter.insert("status".to_string(), Value::String(status));
    }

    let campaigns = state
        .store
        .find(
            CAMPAIGNS,
            Value::Object(filter),
            FindOptions {
                sort: Some(("id".to_string(), SortOrder::Asc)),
                skip: 0,
                limit: Some(params.limit.unwrap_or(100)),
            },
        )
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(CampaignListResponse {
        count: campaigns.len(),
        campaigns,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

async fn campaign_lead_count(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let count = state
        .store
        .count(LEADS, json!({ "campaignId": id }))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({ "campaignId": id, "leads": count })))
}
