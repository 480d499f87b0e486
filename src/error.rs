use crate::board::BoardError;
use crate::import::ImportError;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_okapi::gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use std::io::Cursor;

#[derive(Debug)]
pub enum ApiError {
    DatabaseError(String),
    BadRequest(String),
    /// The task board rejected or failed a request.
    Upstream(String),
    ConfigError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, error_type, message) = match self {
            ApiError::DatabaseError(msg) => {
                log::error!("database error: {}", msg);
                (Status::InternalServerError, "DatabaseError", msg)
            }
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                (Status::BadRequest, "BadRequest", msg)
            }
            ApiError::Upstream(msg) => {
                log::error!("board error: {}", msg);
                (Status::BadGateway, "UpstreamError", msg)
            }
            ApiError::ConfigError(msg) => {
                log::error!("configuration error: {}", msg);
                (Status::InternalServerError, "ConfigurationError", msg)
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        let json = serde_json::to_string(&error_response)
            .unwrap_or_else(|_| r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string());

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Ok(Responses::default())
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Board(BoardError::Config(msg)) => ApiError::ConfigError(msg),
            ImportError::Board(board) => ApiError::Upstream(board.to_string()),
            ImportError::Lookup(lookup) => ApiError::DatabaseError(lookup.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_board_credentials_are_a_configuration_error() {
        let err: ApiError = ImportError::Board(BoardError::Config("missing key".into())).into();
        assert!(matches!(err, ApiError::ConfigError(msg) if msg == "missing key"));
    }

    #[test]
    fn board_status_errors_are_upstream_errors() {
        let err: ApiError = ImportError::Board(BoardError::Network {
            status: reqwest::StatusCode::UNAUTHORIZED,
            body: "invalid token".into(),
        })
        .into();
        assert!(matches!(err, ApiError::Upstream(msg) if msg.contains("invalid token")));
    }
}
