use actix_web::{HttpResponse, Responder};
use tracing::error;

pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// Prometheus text exposition of the process registry.
pub async fn metrics() -> HttpResponse {
    match crate::metrics::render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
