use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::api::{run_blocking, ApiError, AppState};
use crate::models::{OperationUpdate, OperationView};

#[derive(Deserialize)]
pub struct StartOperationRequest {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub total_size: Option<u64>,
    #[serde(default)]
    pub pid: Option<u32>,
}

#[derive(Deserialize, Default)]
pub struct CompleteOperationRequest {
    #[serde(default)]
    pub error: Option<String>,
}

pub async fn list_operations(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let operations = run_blocking(&data, |sup| sup.list_operations()).await?;
    Ok(HttpResponse::Ok().json(operations))
}

pub async fn start_operation(
    data: web::Data<AppState>,
    req: web::Json<StartOperationRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    let op = run_blocking(&data, move |sup| {
        sup.start_operation(&req.id, &req.kind, &req.description, req.total_size, req.pid)
    })
    .await??;

    let warning = run_blocking(&data, |sup| sup.should_warn_before_operation()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "operation": OperationView::from(op),
        "warning": warning
    })))
}

pub async fn get_operation(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let op = run_blocking(&data, move |sup| sup.operation(&id)).await??;
    Ok(HttpResponse::Ok().json(op))
}

pub async fn update_operation(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<OperationUpdate>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let update = req.into_inner();
    let op = run_blocking(&data, move |sup| sup.update_operation(&id, update)).await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "operation": OperationView::from(op)
    })))
}

pub async fn complete_operation(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: Option<web::Json<CompleteOperationRequest>>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let error = req.and_then(|r| r.into_inner().error);
    let op = run_blocking(&data, move |sup| sup.complete_operation(&id, error)).await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "operation": OperationView::from(op)
    })))
}

pub async fn operations_summary(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let summary = run_blocking(&data, |sup| sup.operations_summary()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

pub async fn operation_warning(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let warning = run_blocking(&data, |sup| sup.should_warn_before_operation()).await?;
    Ok(HttpResponse::Ok().json(warning))
}
