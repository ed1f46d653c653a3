//! HTTP trigger: `GET /` runs the pipeline once and reports the outcome.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use crm_snapshot_core::{Pipeline, RunReport};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SuccessResponse {
    pub status: String,
    pub processed_counts: Map<String, Value>,
    pub total_leads: u64,
    pub total_deals: u64,
    pub total_contacts: u64,
    pub total_user_list: u64,
    pub company_list: u64,
    pub total_deal_category_list: u64,
    pub total_status_list: u64,
}

impl From<&RunReport> for SuccessResponse {
    fn from(report: &RunReport) -> Self {
        Self {
            status: "success".to_string(),
            processed_counts: report.counts().clone(),
            total_leads: report.count("leads"),
            total_deals: report.count("deals"),
            total_contacts: report.count("contacts"),
            total_user_list: report.count("user_list"),
            company_list: report.count("company_list"),
            total_deal_category_list: report.count("deal_category_list"),
            total_status_list: report.count("status_list"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub failed_step: String,
    pub completed_counts: Map<String, Value>,
}

async fn trigger_handler(State(pipeline): State<Arc<Pipeline>>) -> Response {
    info!("[TRIGGER] Run requested");
    match pipeline.run().await {
        Ok(report) => (StatusCode::OK, Json(SuccessResponse::from(&report))).into_response(),
        Err(failure) => {
            error!(step = %failure.step, error = %failure, "[TRIGGER][ERROR] Run failed");
            let body = ErrorResponse {
                status: "error".to_string(),
                message: failure.source.to_string(),
                failed_step: failure.step.to_string(),
                completed_counts: failure.completed.counts().clone(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// Build the HTTP router around a shared pipeline.
pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/", get(trigger_handler))
        .with_state(pipeline)
}

/// Serve the trigger on `0.0.0.0:<port>` until Ctrl-C.
pub async fn serve(pipeline: Arc<Pipeline>, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP port {port}"))?;
    info!(%addr, "[TRIGGER] Listening");

    axum::serve(listener, build_router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("[TRIGGER] Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}
