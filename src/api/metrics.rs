use actix_web::{web, HttpResponse};

use crate::api::{run_blocking, ApiError, AppState};
use crate::metrics::METRICS;

pub async fn get_metrics(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    // refresh every gauge from one dashboard pull, then render
    run_blocking(&data, |sup| {
        let dashboard = sup.dashboard_summary();
        let operations = sup.list_operations();
        METRICS.observe(&dashboard, &operations);
    })
    .await?;

    match METRICS.render() {
        Ok(metrics_text) => Ok(HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(metrics_text)),
        Err(e) => {
            log::error!("Failed to render metrics: {}", e);
            Ok(HttpResponse::InternalServerError().body("Failed to render metrics"))
        }
    }
}
