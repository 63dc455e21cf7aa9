use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::time::Duration;

use crate::api::{run_blocking, ApiError, AppState};
use crate::services::find_available_port;

const DEFAULT_HISTORY_MINUTES: u32 = 60;
const DEFAULT_EVENT_LIMIT: usize = 50;
const DEFAULT_PORT_SEARCH_START: u16 = 8000;
const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 60;

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub minutes: Option<u32>,
}

#[derive(Deserialize)]
pub struct MonitorQuery {
    /// seconds
    #[serde(default)]
    pub interval: Option<u64>,
}

#[derive(Deserialize)]
pub struct PortQuery {
    #[serde(default)]
    pub start: Option<u16>,
}

#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub service: Option<String>,
}

pub async fn current_resources(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let snapshot = run_blocking(&data, |sup| sup.snapshot_now()).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

pub async fn resource_history(
    data: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, ApiError> {
    let minutes = query.minutes.unwrap_or(DEFAULT_HISTORY_MINUTES);
    let history = run_blocking(&data, move |sup| sup.history(minutes)).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "minutes": minutes,
        "count": history.len(),
        "snapshots": history
    })))
}

pub async fn start_monitor(
    data: web::Data<AppState>,
    query: web::Query<MonitorQuery>,
) -> Result<HttpResponse, ApiError> {
    let interval = Duration::from_secs(query.interval.unwrap_or(DEFAULT_MONITOR_INTERVAL_SECS).max(1));
    let started = data.supervisor.start_monitor(interval);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": if started { "monitor started" } else { "monitor already running" },
        "running": true
    })))
}

pub async fn stop_monitor(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let was_running = data.supervisor.stop_monitor();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": if was_running { "monitor stopping" } else { "monitor was not running" },
        "running": false
    })))
}

pub async fn available_port(
    data: web::Data<AppState>,
    query: web::Query<PortQuery>,
) -> Result<HttpResponse, ApiError> {
    let start = query.start.unwrap_or(DEFAULT_PORT_SEARCH_START);
    let port = run_blocking(&data, move |sup| find_available_port(sup.inspector(), start)).await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "port": port
    })))
}

pub async fn dashboard(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let summary = run_blocking(&data, |sup| sup.dashboard_summary()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

pub async fn list_events(
    data: web::Data<AppState>,
    query: web::Query<EventsQuery>,
) -> Result<HttpResponse, ApiError> {
    let EventsQuery { limit, service } = query.into_inner();
    let limit = limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    let events = run_blocking(&data, move |sup| sup.events(limit, service.as_deref())).await?;
    Ok(HttpResponse::Ok().json(events))
}
