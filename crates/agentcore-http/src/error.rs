//! Maps engine and permission errors onto the HTTP edge's `{name, data}`
//! error body and a status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use agentcore_engine::EngineError;
use agentcore_permission::{NotFound, PermissionError, QuestionError};

pub struct HttpError {
    status: StatusCode,
    name: &'static str,
    data: serde_json::Value,
}

impl HttpError {
    pub fn new(status: StatusCode, name: &'static str, data: serde_json::Value) -> Self {
        HttpError { status, name, data }
    }

    pub fn bad_request(name: &'static str, message: impl Into<String>) -> Self {
        HttpError::new(StatusCode::BAD_REQUEST, name, json!({"message": message.into()}))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError::new(StatusCode::NOT_FOUND, "NotFoundError", json!({"message": message.into()}))
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = json!({"name": self.name, "data": self.data});
        (self.status, Json(body)).into_response()
    }
}

impl From<EngineError> for HttpError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(id) => {
                HttpError::new(StatusCode::NOT_FOUND, "NotFoundError", json!({"message": id}))
            }
            EngineError::ModelNotFound { provider_id, model_id, suggestions } => HttpError::new(
                StatusCode::BAD_REQUEST,
                "ModelNotFoundError",
                json!({"providerID": provider_id, "modelID": model_id, "suggestions": suggestions}),
            ),
            EngineError::NoUserMessage => {
                HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "UnknownError", json!({"message": "no user message"}))
            }
            EngineError::Unknown(message) => {
                HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "UnknownError", json!({"message": message}))
            }
            EngineError::Storage(storage_err) => HttpError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "UnknownError",
                json!({"message": storage_err.to_string()}),
            ),
        }
    }
}

impl From<PermissionError> for HttpError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::Denied { rule } => HttpError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "PermissionDeniedError",
                json!({"permission": rule.permission, "pattern": rule.pattern}),
            ),
            PermissionError::Rejected => {
                HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "PermissionRejectedError", json!({}))
            }
            PermissionError::Corrected(message) => {
                HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "PermissionCorrectedError", json!({"message": message}))
            }
        }
    }
}

impl From<QuestionError> for HttpError {
    fn from(_: QuestionError) -> Self {
        HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "QuestionRejectedError", json!({}))
    }
}

impl From<NotFound> for HttpError {
    fn from(_: NotFound) -> Self {
        HttpError::not_found("no pending request with that id")
    }
}
