// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Error types for CaretForge
//!
//! This module defines all error types used throughout the application.

use thiserror::Error;

/// Main error type for CaretForge operations
#[derive(Error, Debug)]
pub enum CaretError {
    /// Provider/API-related errors
    #[error("Provider error: {0}")]
    Api(#[from] ApiError),

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File indexing errors
    #[error("Index error: {0}")]
    Index(String),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid or missing credential)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The remote endpoint returned a non-success status
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// The response body could not be interpreted
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),

    /// Timeout waiting for a response or run completion
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The backend asked for client-side behavior this adapter cannot provide
    #[error("Unsupported by this provider: {0}")]
    Unsupported(String),
}

/// Result type alias for CaretForge operations
pub type Result<T> = std::result::Result<T, CaretError>;

impl CaretError {
    /// Short stable code for display and JSON error output.
    pub fn code(&self) -> &'static str {
        match self {
            CaretError::Api(_) => "provider_error",
            CaretError::ToolExecution(_) => "tool_error",
            CaretError::PermissionDenied(_) => "permission_denied",
            CaretError::Config(_) => "config_error",
            CaretError::Io(_) => "io_error",
            CaretError::Json(_) => "json_error",
            CaretError::Http(_) => "http_error",
            CaretError::InvalidInput(_) => "invalid_input",
            CaretError::Index(_) => "index_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_tool_execution() {
        let err = CaretError::ToolExecution("tool failed".to_string());
        assert!(err.to_string().contains("tool failed"));
        assert_eq!(err.code(), "tool_error");
    }

    #[test]
    fn test_error_permission_denied() {
        let err = CaretError::PermissionDenied("write_file".to_string());
        assert!(err.to_string().contains("Permission denied"));
        assert_eq!(err.code(), "permission_denied");
    }

    #[test]
    fn test_error_config() {
        let err = CaretError::Config("missing provider".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert_eq!(err.code(), "config_error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CaretError = io_err.into();
        assert!(err.to_string().contains("IO error"));
        assert_eq!(err.code(), "io_error");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: CaretError = json_err.into();
        assert_eq!(err.code(), "json_error");
    }

    #[test]
    fn test_api_error_server_error() {
        let err = ApiError::ServerError {
            status: 500,
            message: "internal server error".to_string(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("internal server error"));
    }

    #[test]
    fn test_api_error_authentication_failed() {
        let err = ApiError::AuthenticationFailed("bad key".to_string());
        assert!(err.to_string().contains("Authentication failed"));
    }

    #[test]
    fn test_api_error_stream_error() {
        let err = ApiError::StreamError("stream closed".to_string());
        assert!(err.to_string().contains("Streaming error"));
    }

    #[test]
    fn test_api_error_unsupported() {
        let err = ApiError::Unsupported("client-side function calling".to_string());
        assert!(err.to_string().contains("Unsupported"));
    }

    #[test]
    fn test_error_from_api_error() {
        let err: CaretError = ApiError::Timeout("run polling".to_string()).into();
        assert!(err.to_string().contains("Provider error"));
        assert_eq!(err.code(), "provider_error");
    }

    #[test]
    fn test_result_type_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        fn err_fn() -> Result<i32> {
            Err(CaretError::InvalidInput("test".to_string()))
        }

        assert_eq!(ok_fn().unwrap(), 42);
        assert!(err_fn().is_err());
    }
}
