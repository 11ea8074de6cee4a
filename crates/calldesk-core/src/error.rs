//! Unified error handling for Calldesk
//!
//! This module provides a single error type covering every failure scenario
//! in the call orchestration core, with automatic HTTP response mapping.
//! The taxonomy matters for webhook processing: client errors terminate the
//! request with no state mutation, server errors prompt the telephony
//! provider to redeliver the webhook.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Webhook Authenticity ====================
    #[error("Invalid webhook signature")]
    InvalidSignature,

    // ==================== Identity Resolution ====================
    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    #[error("Configuration incomplete: {0} is not set")]
    ConfigurationIncomplete(&'static str),

    // ==================== Provider Errors ====================
    #[error("Telephony provider unavailable: {0}")]
    ProviderUnavailable(String),

    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Token generation failed: {0}")]
    Token(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_)
            | AppError::InvalidInput(_)
            | AppError::ConfigurationIncomplete(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized - unauthenticated webhooks get no processing
            AppError::InvalidSignature => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            AppError::IdentityNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,

            // 502 Bad Gateway - provider retries on 5xx
            AppError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidSignature => "invalid_signature",
            AppError::IdentityNotFound(_) => "identity_not_found",
            AppError::ConfigurationIncomplete(_) => "configuration_incomplete",
            AppError::ProviderUnavailable(_) => "provider_unavailable",
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::PersistenceConflict(_) => "persistence_conflict",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::Token(_) => "token_error",
        }
    }

    /// Whether the telephony provider should redeliver the webhook
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ProviderUnavailable(_)
                | AppError::Database(_)
                | AppError::Pool(_)
                | AppError::Transaction(_)
                | AppError::PersistenceConflict(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Unauthenticated webhooks are rejected with an empty body so a
        // probing caller learns nothing about the deployment.
        if matches!(self, AppError::InvalidSignature) {
            return HttpResponse::build(status).finish();
        }

        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
