use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::{Catcher, Request, Response, catch, catchers};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::auth::AuthError;
use crate::store::StoreError;
use crate::validation::ValidationErrors;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error a handler hands back to Rocket. Every variant renders as the JSON
/// error envelope; internal detail is logged and never sent.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationErrors),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            errors: None,
        }
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Unauthorized(_) => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let body = match self {
            ApiError::Validation(errors) => {
                log::debug!("validation failed on fields {:?}", errors.fields().collect::<Vec<_>>());
                ErrorResponse {
                    errors: Some(errors),
                    ..ErrorResponse::new("Bad Request")
                }
            }
            ApiError::Internal(detail) => {
                log::error!("internal error: {}", detail);
                ErrorResponse::new("Internal Server Error")
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => {
                log::debug!("{}: {}", status.code, msg);
                ErrorResponse::new(msg)
            }
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"status":"error","message":"Internal Server Error"}"#.to_string()
        });

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = err.status();
        match err {
            AuthError::Validation(errors) => ApiError::Validation(errors),
            err if err.is_internal() => ApiError::Internal(err.to_string()),
            err => {
                let message = err.to_string();
                match status.code {
                    401 => ApiError::Unauthorized(message),
                    403 => ApiError::Forbidden(message),
                    404 => ApiError::NotFound(message),
                    409 => ApiError::Conflict(message),
                    _ => ApiError::BadRequest(message),
                }
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => ApiError::Conflict("Email is already in use".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

// Guard and routing failures never reach a handler, so the catchers render
// them with the same envelope.

fn json_error(status: Status, message: &str) -> (Status, Json<ErrorResponse>) {
    (status, Json(ErrorResponse::new(message)))
}

#[catch(400)]
fn bad_request() -> (Status, Json<ErrorResponse>) {
    json_error(Status::BadRequest, "Invalid request body")
}

#[catch(401)]
fn unauthorized() -> (Status, Json<ErrorResponse>) {
    json_error(Status::Unauthorized, "Please authenticate")
}

#[catch(403)]
fn forbidden() -> (Status, Json<ErrorResponse>) {
    json_error(
        Status::Forbidden,
        "You don't have permission to access this resource",
    )
}

#[catch(404)]
fn not_found() -> (Status, Json<ErrorResponse>) {
    json_error(Status::NotFound, "Endpoint Not Found")
}

#[catch(422)]
fn unprocessable() -> (Status, Json<ErrorResponse>) {
    json_error(Status::BadRequest, "Invalid request body")
}

#[catch(default)]
fn default_catcher(status: Status, _: &Request<'_>) -> (Status, Json<ErrorResponse>) {
    if status.code >= 500 {
        return json_error(status, "Internal Server Error");
    }
    json_error(status, status.reason().unwrap_or("Error"))
}

pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        unprocessable,
        default_catcher
    ]
}
