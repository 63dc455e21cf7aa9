pub mod error;
pub mod metrics;
pub mod operations;
pub mod resources;
pub mod services;

pub use error::ApiError;

use crate::supervisor::Supervisor;
use actix_web::{web, HttpResponse, Responder};
use std::time::Duration;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Supervisor,
    /// Hard deadline for one blocking supervisor call
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(supervisor: Supervisor, request_timeout: Duration) -> Self {
        Self {
            supervisor,
            request_timeout,
        }
    }
}

/// Run a supervisor call on the blocking pool, bounded by the request timeout.
///
/// A call that times out keeps running to completion; only the response is abandoned.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Supervisor) -> T + Send + 'static,
    T: Send + 'static,
{
    let supervisor = state.supervisor.clone();
    let call = web::block(move || f(&supervisor));
    match tokio::time::timeout(state.request_timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ApiError::Blocking(e.to_string())),
        Err(_) => {
            log::warn!(
                "request exceeded {}s, abandoning response",
                state.request_timeout.as_secs()
            );
            Err(ApiError::Timeout(state.request_timeout.as_secs()))
        }
    }
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy"
    }))
}

/// Mount every route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics::get_metrics))
        .service(
            web::scope("/api")
                .route("/services", web::get().to(services::list_services))
                .route("/services/register", web::post().to(services::register_service))
                .route("/services/{name}", web::delete().to(services::unregister_service))
                .route("/services/{name}/status", web::get().to(services::service_status))
                .route("/services/{name}/start", web::post().to(services::start_service))
                .route("/services/{name}/stop", web::post().to(services::stop_service))
                .route("/services/{name}/restart", web::post().to(services::restart_service))
                .route("/services/{name}/kill", web::post().to(services::kill_service))
                .route("/conflicts", web::get().to(services::list_conflicts))
                .route("/conflicts/heal", web::post().to(services::heal_conflicts))
                .route("/processes/{pid}/kill", web::post().to(services::kill_process))
                .route("/ports/available", web::get().to(resources::available_port))
                .route("/resources", web::get().to(resources::current_resources))
                .route("/resources/history", web::get().to(resources::resource_history))
                .route("/monitor/start", web::post().to(resources::start_monitor))
                .route("/monitor/stop", web::post().to(resources::stop_monitor))
                .route("/operations", web::get().to(operations::list_operations))
                .route("/operations", web::post().to(operations::start_operation))
                .route("/operations/summary", web::get().to(operations::operations_summary))
                .route("/operations/warning", web::get().to(operations::operation_warning))
                .route("/operations/{id}", web::get().to(operations::get_operation))
                .route("/operations/{id}", web::patch().to(operations::update_operation))
                .route("/operations/{id}/complete", web::post().to(operations::complete_operation))
                .route("/dashboard", web::get().to(resources::dashboard))
                .route("/events", web::get().to(resources::list_events)),
        );
}


#[cfg(test)]
mod tests {
    use super::testing::app_state;
    use super::*;
    use crate::services::port_inspector::testing::FakePortInspector;
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_rt::test]
    async fn test_health() {
        let app = test::init_service(App::new().configure(configure)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
    }

    #[actix_rt::test]
    async fn test_run_blocking_times_out() {
        let mut state = app_state(Arc::new(FakePortInspector::new()), vec![]);
        state.request_timeout = Duration::from_millis(20);
        let result = run_blocking(&state, |_| std::thread::sleep(Duration::from_millis(300))).await;
        assert!(matches!(result, Err(ApiError::Timeout(_))));
    }
}
