use actix_web::{HttpResponse, get, web};
use tracing::error;

use crate::metrics::PrometheusMetrics;

macros_utils::routes! {
    route metrics_route,
}

/// Prometheus scrape endpoint
#[get("/metrics")]
pub async fn metrics_route(metrics: web::Data<PrometheusMetrics>) -> HttpResponse {
    match metrics.encode() {
        Ok(body) => HttpResponse::Ok().content_type(prometheus::TEXT_FORMAT).body(body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
