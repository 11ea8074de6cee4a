//! Health check handler

use actix_web::{web, HttpResponse, Result};
use serde_json::json;

/// Liveness probe
pub async fn health() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "calldesk",
    })))
}

/// Mount the health route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
