//! Error handler for the recipe API.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::{Error as SQLxError, postgres::PgDatabaseError};
use thiserror::Error;
use validator::ValidationErrors;

use crate::response::Envelope;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("error parsing form data")]
    ParsingForm(Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error(transparent)]
    Query(#[from] QueryRejection),

    #[error(transparent)]
    Path(#[from] PathRejection),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),

    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("not found")]
    NotFound,

    #[error("invalid 'Authorization' header")]
    Unauthorized,
}

impl ServerError {
    /// Wrap any error into [`ServerError::Internal`].
    pub fn internal(
        details: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            details: details.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug)]
pub struct ResponseError {
    status: StatusCode,
    message: String,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Update `message` field.
    pub fn message(mut self, message: &str) -> Self {
        self.message = message.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Add a single error located on `field`.
    pub fn field(mut self, field: &str, message: &str) -> Self {
        self.errors = Some(vec![FieldError {
            field: field.to_owned(),
            message: message.to_owned(),
        }]);
        self
    }

    /// Transform [`ResponseError`] into an [`Envelope`].
    pub fn into_envelope(self) -> Envelope<Option<Vec<FieldError>>> {
        Envelope::new(self.status, self.message, self.errors)
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error.".to_owned(),
            errors: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .message("There were validation errors with your request.")
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => {
                response.errors(validation_errors)
            },

            ServerError::ParsingForm(err) => response
                .message("Server error during data parsing.")
                .field("body", &err.to_string()),

            ServerError::Axum(err) => response.field("body", &err.body_text()),

            ServerError::Query(err) => {
                response.field("query", &err.body_text())
            },

            ServerError::Path(err) => response.field("id", &err.body_text()),

            ServerError::Multipart(err) => response
                .field("image", &err.body_text())
                .status(err.status()),

            ServerError::Sql(SQLxError::RowNotFound) | ServerError::NotFound => {
                response.message("Not found.").status(StatusCode::NOT_FOUND)
            },

            ServerError::Sql(err) => match err
                .as_database_error()
                .and_then(|e| e.try_downcast_ref::<PgDatabaseError>())
            {
                // constraint violations are caused by the request.
                Some(pg) if pg.code().starts_with("23") => response.field(
                    pg.column().unwrap_or("non_field_errors"),
                    pg.detail().unwrap_or(pg.message()),
                ),
                _ => {
                    tracing::error!(error = %err, "SQL request failed");
                    ResponseError::default()
                },
            },

            ServerError::Unauthorized => response
                .message("Missing or invalid 'Authorization' header.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::Crypto(err) => {
                tracing::error!(error = %err, "cryptographic operation failed");
                ResponseError::default()
            },

            ServerError::Internal { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");

                ResponseError::default()
            },
        };

        response.into_envelope().into_response()
    }
}
