use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::time::Duration;

use crate::api::{run_blocking, ApiError, AppState};
use crate::error::SupervisorError;
use crate::models::ServiceRegistration;

#[derive(Deserialize)]
pub struct StartQuery {
    #[serde(default)]
    pub wait: Option<bool>,
    /// seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Deserialize)]
pub struct RestartQuery {
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Deserialize)]
pub struct KillQuery {
    #[serde(default)]
    pub force: bool,
}

fn start_timeout(state: &AppState, requested: Option<u64>) -> Duration {
    requested
        .map(Duration::from_secs)
        .unwrap_or(state.supervisor.settings().start_timeout)
}

pub async fn list_services(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let services = run_blocking(&data, |sup| {
        sup.check_all();
        sup.services()
    })
    .await?;
    Ok(HttpResponse::Ok().json(services))
}

pub async fn register_service(
    data: web::Data<AppState>,
    req: web::Json<ServiceRegistration>,
) -> Result<HttpResponse, ApiError> {
    let reg = req.into_inner();
    let name = reg.name.trim().to_string();
    log::info!("register request for '{}' (port {:?})", name, reg.port);

    let created = run_blocking(&data, move |sup| sup.register(reg)).await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": format!("Service '{}' {}", name, if created { "registered" } else { "updated" }),
        "created": created
    })))
}

pub async fn unregister_service(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let target = name.clone();
    if !run_blocking(&data, move |sup| sup.unregister(&target)).await? {
        return Err(ApiError::NotFound(format!("Service '{}' not found", name)));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": format!("Service '{}' unregistered", name)
    })))
}

pub async fn service_status(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let service = run_blocking(&data, move |sup| {
        sup.status(&name)?;
        sup.service(&name)
            .ok_or(SupervisorError::UnknownService(name))
    })
    .await??;
    Ok(HttpResponse::Ok().json(service))
}

pub async fn start_service(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<StartQuery>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let wait = query.wait.unwrap_or(true);
    let timeout = start_timeout(&data, query.timeout);

    let outcome = run_blocking(&data, move |sup| sup.start(&name, wait, timeout)).await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": format!("Service '{}' started (pid {})", outcome.service, outcome.pid),
        "result": outcome
    })))
}

pub async fn stop_service(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let target = name.clone();
    run_blocking(&data, move |sup| sup.stop(&target)).await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": format!("Service '{}' stopped", name)
    })))
}

pub async fn restart_service(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<RestartQuery>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let timeout = start_timeout(&data, query.timeout);
    let report = run_blocking(&data, move |sup| sup.restart(&name, timeout)).await??;

    let status = if report.started { "success" } else { "error" };
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": status,
        "message": format!("Service '{}' restart finished", report.service),
        "result": report
    })))
}

pub async fn kill_service(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let report = run_blocking(&data, move |sup| sup.kill_service(&name)).await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": format!("Port {} is free", report.port),
        "result": report
    })))
}

pub async fn kill_process(
    data: web::Data<AppState>,
    path: web::Path<u32>,
    query: web::Query<KillQuery>,
) -> Result<HttpResponse, ApiError> {
    let pid = path.into_inner();
    let force = query.force;
    run_blocking(&data, move |sup| sup.kill_by_pid(pid, force)).await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": format!("Process {} killed", pid)
    })))
}

pub async fn list_conflicts(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let conflicts = run_blocking(&data, |sup| sup.get_conflicts()).await?;
    let reports: Vec<String> = conflicts.iter().map(ToString::to_string).collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "conflicts": conflicts,
        "reports": reports
    })))
}

pub async fn heal_conflicts(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let results = run_blocking(&data, |sup| sup.heal_all()).await?;
    let all_healed = results.values().all(|healed| *healed);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": if all_healed { "success" } else { "error" },
        "results": results
    })))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::app_state;
    use crate::api::{configure, AppState};
    use crate::models::ServiceConfig;
    use crate::services::port_inspector::testing::FakePortInspector;
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App};
    use std::sync::Arc;

    fn configs() -> Vec<ServiceConfig> {
        vec![
            ServiceConfig::new("api", Some(5001), "python", "API"),
            ServiceConfig::new("ui", Some(3000), "node", "UI"),
        ]
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .configure(configure),
            )
            .await
        };
    }

    fn state(inspector: &Arc<FakePortInspector>) -> AppState {
        app_state(inspector.clone(), configs())
    }

    #[actix_rt::test]
    async fn test_register_then_list() {
        let inspector = Arc::new(FakePortInspector::new());
        let app = app!(state(&inspector));

        let req = test::TestRequest::post()
            .uri("/api/services/register")
            .set_json(serde_json::json!({
                "name": "wizard",
                "port": 5002,
                "description": "Setup wizard",
                "start_command": "python wizard.py"
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["created"], true);

        let req = test::TestRequest::get().uri("/api/services").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["api", "ui", "wizard"]);
        assert_eq!(body[2]["status"], "stopped");
    }

    #[actix_rt::test]
    async fn test_register_rejects_empty_name() {
        let inspector = Arc::new(FakePortInspector::new());
        let app = app!(state(&inspector));
        let req = test::TestRequest::post()
            .uri("/api/services/register")
            .set_json(serde_json::json!({ "name": " " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_unknown_service_is_404() {
        let inspector = Arc::new(FakePortInspector::new());
        let app = app!(state(&inspector));

        for req in [
            test::TestRequest::get().uri("/api/services/ghost/status").to_request(),
            test::TestRequest::post().uri("/api/services/ghost/stop").to_request(),
            test::TestRequest::delete().uri("/api/services/ghost").to_request(),
        ] {
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["status"], "error");
        }
    }

    #[actix_rt::test]
    async fn test_start_without_command_is_400() {
        let inspector = Arc::new(FakePortInspector::new());
        let app = app!(state(&inspector));
        let req = test::TestRequest::post()
            .uri("/api/services/api/start?wait=false")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_status_and_conflicts() {
        let inspector = Arc::new(FakePortInspector::new());
        inspector.occupy(5001, 4242, "python3");
        inspector.occupy(3000, 4243, "nginx");
        let app = app!(state(&inspector));

        let req = test::TestRequest::get().uri("/api/services/api/status").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "running");
        assert_eq!(body["pid"], 4242);

        let req = test::TestRequest::get().uri("/api/conflicts").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["conflicts"].as_array().unwrap().len(), 1);
        assert_eq!(body["reports"][0], "expected node, found nginx on port 3000, pid 4243");
    }

    #[actix_rt::test]
    async fn test_start_into_conflict_is_409_with_report() {
        let inspector = Arc::new(FakePortInspector::new());
        inspector.occupy(5001, 4242, "node");
        let mut api = ServiceConfig::new("api", Some(5001), "python", "");
        api.start_command = Some("python app.py".into());
        let app = app!(app_state(inspector.clone(), vec![api]));

        let req = test::TestRequest::post().uri("/api/services/api/start").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["conflict"]["occupant"]["process_name"], "node");
    }

    #[actix_rt::test]
    async fn test_kill_service_on_free_port() {
        let inspector = Arc::new(FakePortInspector::new());
        let app = app!(state(&inspector));
        let req = test::TestRequest::post().uri("/api/services/api/kill").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["result"]["killed"].as_array().unwrap().len(), 0);
    }

    #[actix_rt::test]
    async fn test_heal_with_nothing_to_do() {
        let inspector = Arc::new(FakePortInspector::new());
        let app = app!(state(&inspector));
        let req = test::TestRequest::post().uri("/api/conflicts/heal").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "success");
        assert!(body["results"].as_object().unwrap().is_empty());
    }
}
