use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum Error {
    Validation(validator::ValidationError),
    BadRequest(String),
}

impl From<validator::ValidationError> for Error {
    fn from(err: validator::ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Error::Validation(e) => (
                StatusCode::BAD_REQUEST,
                e.message
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("Invalid request: {}", e.code)),
            ),
            Error::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
