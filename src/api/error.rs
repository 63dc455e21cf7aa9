use crate::error::SupervisorError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Failure of one HTTP request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("{0}")]
    NotFound(String),

    #[error("request did not finish within {0}s")]
    Timeout(u64),

    #[error("worker pool error: {0}")]
    Blocking(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Supervisor(e) => match e {
                SupervisorError::UnknownService(_) | SupervisorError::UnknownOperation(_) => {
                    StatusCode::NOT_FOUND
                }
                SupervisorError::AlreadyRunning { .. }
                | SupervisorError::StartInProgress(_)
                | SupervisorError::PortConflict(_)
                | SupervisorError::PortStillOccupied { .. }
                | SupervisorError::OperationInProgress(_)
                | SupervisorError::OperationFinished(_) => StatusCode::CONFLICT,
                SupervisorError::NoStartCommand(_)
                | SupervisorError::NoPort(_)
                | SupervisorError::InvalidRegistration(_) => StatusCode::BAD_REQUEST,
                SupervisorError::ReadinessTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                SupervisorError::Spawn { .. }
                | SupervisorError::KillFailed { .. }
                | SupervisorError::StopCommand { .. }
                | SupervisorError::NoAvailablePort(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        });
        if let ApiError::Supervisor(SupervisorError::PortConflict(conflict)) = self {
            body["conflict"] = serde_json::json!(conflict);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PortConflict, PortOccupant};

    #[test]
    fn test_status_codes() {
        let cases = [
            (SupervisorError::UnknownService("x".into()), StatusCode::NOT_FOUND),
            (SupervisorError::NoStartCommand("x".into()), StatusCode::BAD_REQUEST),
            (
                SupervisorError::AlreadyRunning { name: "x".into(), pid: 1 },
                StatusCode::CONFLICT,
            ),
            (SupervisorError::StartInProgress("x".into()), StatusCode::CONFLICT),
            (SupervisorError::UnknownOperation("x".into()), StatusCode::NOT_FOUND),
            (SupervisorError::OperationFinished("x".into()), StatusCode::CONFLICT),
            (
                SupervisorError::ReadinessTimeout { name: "x".into(), port: 1, pid: 2, timeout_secs: 3 },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                SupervisorError::KillFailed { pid: 1, reason: "EPERM".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
        assert_eq!(ApiError::Timeout(120).status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_conflict_body_is_actionable() {
        let err = ApiError::from(SupervisorError::PortConflict(PortConflict {
            service: "ui".into(),
            port: 3000,
            expected: "node".into(),
            occupant: Some(PortOccupant { pid: 42, process_name: "nginx".into() }),
        }));
        assert_eq!(err.to_string(), "port conflict: expected node, found nginx on port 3000, pid 42");
        assert_eq!(err.error_response().status(), StatusCode::CONFLICT);
    }
}
