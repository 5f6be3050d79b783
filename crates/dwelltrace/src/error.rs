// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the ingress, query, and feedback transports.

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for the dwelltrace API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiError {
    InvalidPayload,
    OutOfOrder,
    NotFound,
    Conflict,
    InvalidSpan,
    Timeout,
    StoreUnavailable,
    Internal,
}

impl ApiError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidPayload => StatusCode::BAD_REQUEST,
            Self::OutOfOrder => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InvalidSpan => StatusCode::BAD_REQUEST,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPayload => "ERR_INVALID_PAYLOAD",
            Self::OutOfOrder => "ERR_OUT_OF_ORDER",
            Self::NotFound => "ERR_NOT_FOUND",
            Self::Conflict => "ERR_CONFLICT",
            Self::InvalidSpan => "ERR_INVALID_SPAN",
            Self::Timeout => "ERR_TIMEOUT",
            Self::StoreUnavailable => "ERR_STORE_UNAVAILABLE",
            Self::Internal => "ERR_INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(&self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let body = ErrorResponse { error: self.to_error_body(message) };
        (self.http_status(), Json(body))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for ApiError {}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            Self::InvalidPayload => "invalid payload",
            Self::OutOfOrder => "observation is behind the partition watermark",
            Self::NotFound => "no such object state",
            Self::Conflict => "target object id already exists",
            Self::InvalidSpan => "span start must be before span end",
            Self::Timeout => "operation deadline exceeded",
            Self::StoreUnavailable => "state store unavailable",
            Self::Internal => "internal error",
        };
        self.to_http_response(message).into_response()
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
