use std::collections::BTreeMap;

use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::domain::order::OrderError;

// ============================================================================
// HTTP Error Mapping
// ============================================================================
//
// NotFound            → 404
// Validation          → 400 (with per-field messages)
// ProductNotFound     → 400
// InvalidTransition   → 405
// anything else       → 500, details only in the log
//
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

impl ErrorBody {
    fn detail(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            errors: None,
        }
    }
}

/// Body used for every 404.
pub fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorBody::detail("Not found."))
}

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Validation(_) | OrderError::ProductNotFound(_) => StatusCode::BAD_REQUEST,
            OrderError::InvalidTransition { .. } => StatusCode::METHOD_NOT_ALLOWED,
            OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            OrderError::NotFound(_) => ErrorBody::detail("Not found."),
            OrderError::Validation(errors) => {
                let mut fields: BTreeMap<String, String> = BTreeMap::new();
                for (field, message) in errors.fields() {
                    fields
                        .entry(field.clone())
                        .and_modify(|existing| {
                            existing.push(' ');
                            existing.push_str(message);
                        })
                        .or_insert_with(|| message.clone());
                }
                ErrorBody {
                    detail: "Invalid input.".to_string(),
                    errors: Some(fields),
                }
            }
            OrderError::ProductNotFound(id) => {
                ErrorBody::detail(format!("Product with id {id} does not exist."))
            }
            OrderError::InvalidTransition { action, .. } => {
                ErrorBody::detail(OrderError::transition_message(*action))
            }
            OrderError::Store(err) => {
                tracing::error!(error = %err, "❌ Store failure while serving request");
                ErrorBody::detail("Internal server error.")
            }
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Malformed or unreadable JSON bodies are reported as validation errors.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(error = %err, "Rejected request body");
    OrderError::validation("non_field_errors", err.to_string()).into()
}

/// Unparseable query strings are reported as validation errors.
pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(error = %err, "Rejected query string");
    OrderError::validation("query", err.to_string()).into()
}
