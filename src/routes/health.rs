//! Readiness probe reporting whether the credential store answers.

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get};
use serde::{Deserialize, Serialize};

use crate::auth::AuthService;
use crate::models::STATUS_SUCCESS;

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub is_up: bool,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub is_healthy: bool,
    pub result: Vec<ComponentHealth>,
}

#[get("/health-check")]
pub async fn health_check(service: &State<AuthService>) -> (Status, Json<HealthResponse>) {
    let database = match service.users().ping().await {
        Ok(()) => ComponentHealth {
            name: "Postgres".to_string(),
            is_up: true,
            status: "Up".to_string(),
            message: None,
        },
        Err(err) => {
            log::error!("health check: store ping failed: {}", err);
            ComponentHealth {
                name: "Postgres".to_string(),
                is_up: false,
                status: "Down".to_string(),
                message: Some("Database is unreachable".to_string()),
            }
        }
    };

    let is_healthy = database.is_up;
    let (status, envelope) = if is_healthy {
        (Status::Ok, STATUS_SUCCESS)
    } else {
        (Status::InternalServerError, "error")
    };

    (
        status,
        Json(HealthResponse {
            status: envelope.to_string(),
            message: "Health check successful".to_string(),
            is_healthy,
            result: vec![database],
        }),
    )
}
