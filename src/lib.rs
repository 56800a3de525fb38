// lib.rs - Car marketplace app core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod auth;
pub mod capabilities;
pub mod emi;
pub mod event;
pub mod model;
pub mod session;
pub mod view;
pub mod wizard;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;
pub use model::Model;
pub use view::ViewModel;

use capabilities::{HttpError, HttpResponse, HttpResult};

pub const DEFAULT_API_BASE: &str = "https://api.bharatautobazaar.com";
pub const API_PREFIX: &str = "/api/v1";
pub const DEFAULT_COUNTRY_CODE: &str = "+91";
pub const OTP_CODE_LENGTH: usize = 6;
pub const MIN_LISTING_PRICE: u64 = 50_000;
pub const MAX_LISTING_PRICE: u64 = 50_000_000;
pub const MIN_LISTING_YEAR: u32 = 1980;
pub const MAX_LISTING_IMAGES: usize = 10;
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
pub const MAX_TOASTS: usize = 4;
pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 50;
pub const SEND_OTP_TIMEOUT_MS: u64 = 15_000;
pub const VERIFY_OTP_TIMEOUT_MS: u64 = 15_000;
pub const FETCH_TIMEOUT_MS: u64 = 30_000;
pub const CREATE_LISTING_TIMEOUT_MS: u64 = 60_000;
pub const UPLOAD_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    ServerValidation,
    Authentication,
    Authorization,
    NotFound,
    RateLimited,
    Network,
    Timeout,
    Storage,
    Serialization,
    Server,
    InvalidState,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::ServerValidation => "SERVER_VALIDATION_ERROR",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Server => "SERVER_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::RateLimited | Self::Storage | Self::Server => {
                ErrorSeverity::Transient
            }

            Self::Serialization | Self::InvalidState => ErrorSeverity::Fatal,

            Self::Validation
            | Self::ServerValidation
            | Self::Authentication
            | Self::Authorization
            | Self::NotFound
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Storage | Self::Server
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub retry_after_ms: Option<u64>,
    pub field_errors: Vec<FieldError>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            retry_after_ms: None,
            field_errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_retry_after(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn with_field_errors(mut self, field_errors: Vec<FieldError>) -> Self {
        self.field_errors = field_errors;
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.field_errors.push(FieldError::new(field, message));
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn field_message(&self, field: &str) -> Option<&str> {
        self.field_errors
            .iter()
            .find(|fe| fe.field == field)
            .map(|fe| fe.message.as_str())
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Authentication => "Your session has expired. Please sign in again.".into(),
            ErrorKind::Authorization => "You don't have permission to perform this action.".into(),
            ErrorKind::Validation | ErrorKind::ServerValidation => self.message.clone(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::RateLimited => {
                if let Some(retry_after) = self.retry_after_ms {
                    let seconds = retry_after / 1000;
                    format!("Too many requests. Please wait {seconds} seconds and try again.")
                } else {
                    "Too many requests. Please wait a moment and try again.".into()
                }
            }
            ErrorKind::Storage => {
                "Unable to save data on this device. Please free up some storage space.".into()
            }
            ErrorKind::Serialization => {
                "A data error occurred. Please contact support if this persists.".into()
            }
            ErrorKind::Server => "Something went wrong on our side. Please try again later.".into(),
            ErrorKind::InvalidState => {
                "The app is in an invalid state. Please restart the app.".into()
            }
            ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again or contact support.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

/// Error half of the API envelope: `{ "error": { code, message, details } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

/// Flatten `details` (field -> message, list of messages, or a nested
/// object) into a flat field-error list. Nested keys are joined with dots,
/// so "contact" -> "sellerName" becomes `contact.sellerName`.
fn field_errors_from_details(details: &Value, prefix: &str, out: &mut Vec<FieldError>) {
    match details {
        Value::Object(map) => {
            for (key, value) in map {
                let field = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match value {
                    Value::Object(_) => field_errors_from_details(value, &field, out),
                    Value::Array(items) => {
                        for item in items {
                            if let Some(message) = item.as_str() {
                                out.push(FieldError::new(field.clone(), message));
                            }
                        }
                    }
                    Value::String(message) => out.push(FieldError::new(field, message.clone())),
                    _ => {}
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Some(message) = item.as_str() {
                    out.push(FieldError::new(prefix, message));
                }
            }
        }
        Value::String(message) => out.push(FieldError::new(prefix, message.clone())),
        _ => {}
    }
}

fn error_from_status(status: u16, body: Option<&ApiErrorBody>) -> AppError {
    let kind = match status {
        400 | 422 => ErrorKind::ServerValidation,
        401 => ErrorKind::Authentication,
        403 => ErrorKind::Authorization,
        404 => ErrorKind::NotFound,
        408 => ErrorKind::Timeout,
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    };

    let message = body
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| format!("HTTP error: {status}"));

    let mut error = AppError::new(kind, message);
    if let Some(details) = body.and_then(|b| b.details.as_ref()) {
        let mut field_errors = Vec::new();
        field_errors_from_details(details, "", &mut field_errors);
        error = error.with_field_errors(field_errors);
    }
    if let Some(code) = body.and_then(|b| b.code.clone()) {
        error = error.with_internal(code);
    }
    error
}

fn error_from_transport(error: &HttpError) -> AppError {
    match error {
        HttpError::Timeout { timeout_ms, .. } => {
            AppError::new(ErrorKind::Timeout, "Request timed out")
                .with_internal(format!("timeout after {timeout_ms}ms"))
        }
        HttpError::Network { message } => {
            AppError::new(ErrorKind::Network, "Network error").with_internal(message.clone())
        }
        HttpError::Cancelled { .. } => AppError::new(ErrorKind::Network, "Request was cancelled"),
        other => {
            AppError::new(ErrorKind::Unknown, "Request failed").with_internal(other.to_string())
        }
    }
}

/// Single normalized parse step at the HTTP boundary: transport errors,
/// status classification, envelope unwrapping, and `data` extraction all
/// happen here so flow handlers only ever see one canonical shape.
///
/// # Errors
///
/// Returns the crate error taxonomy: `Network`/`Timeout` for transport
/// failures, `Authentication` for 401, `RateLimited` for 429,
/// `ServerValidation` (with field errors) for rejected payloads, `Server`
/// for 5xx, and `Serialization` when a success body does not decode.
pub fn api_result<T: serde::de::DeserializeOwned>(result: &HttpResult) -> AppResult<T> {
    let response = match result {
        Ok(response) => response,
        Err(transport) => return Err(error_from_transport(transport)),
    };

    let envelope = serde_json::from_slice::<ApiEnvelope>(response.body()).ok();

    if !response.is_success() {
        let error_body = envelope.as_ref().and_then(|e| e.error.as_ref());
        let mut error = error_from_status(response.status(), error_body);
        if error.kind == ErrorKind::RateLimited && error.retry_after_ms.is_none() {
            if let Some(retry_after) = retry_after_ms(response) {
                error = error.with_retry_after(retry_after);
            }
        }
        return Err(error);
    }

    let envelope = envelope.ok_or_else(|| {
        AppError::new(ErrorKind::Serialization, "Response body was not valid JSON")
    })?;

    if envelope.success == Some(false) {
        let parsed = error_from_status(400, envelope.error.as_ref());
        let message = envelope
            .error
            .as_ref()
            .and_then(|e| e.message.clone())
            .or(envelope.message)
            .unwrap_or_else(|| "The server rejected the request".into());
        return Err(AppError::new(ErrorKind::ServerValidation, message)
            .with_field_errors(parsed.field_errors));
    }

    let data = envelope.data.ok_or_else(|| {
        AppError::new(
            ErrorKind::Serialization,
            "Response was missing its data payload",
        )
    })?;

    serde_json::from_value(data).map_err(|e| {
        AppError::new(
            ErrorKind::Serialization,
            "Response data had an unexpected shape",
        )
        .with_internal(e.to_string())
    })
}

fn retry_after_ms(response: &HttpResponse) -> Option<u64> {
    response
        .header("Retry-After")
        .and_then(|v| v.parse::<u64>().ok())
        .map(|seconds| seconds * 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::HttpHeaders;

    fn response(status: u16, body: &str) -> HttpResult {
        Ok(HttpResponse::new(
            status,
            HttpHeaders::new(),
            body.as_bytes().to_vec(),
            "req-1".into(),
        ))
    }

    #[test]
    fn envelope_success_unwraps_data() {
        let result = response(200, r#"{"success":true,"data":{"otp_id":"abc123"}}"#);
        let data: serde_json::Value = api_result(&result).unwrap();
        assert_eq!(data["otp_id"], "abc123");
    }

    #[test]
    fn envelope_missing_data_is_a_hard_failure() {
        let result = response(200, r#"{"success":true}"#);
        let error = api_result::<serde_json::Value>(&result).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Serialization);
    }

    #[test]
    fn envelope_success_false_maps_to_server_validation() {
        let result = response(
            200,
            r#"{"success":false,"error":{"code":"VALIDATION_ERROR","message":"Invalid OTP","details":{"otp":["Invalid OTP. 2 attempts remaining."]}}}"#,
        );
        let error = api_result::<serde_json::Value>(&result).unwrap_err();
        assert_eq!(error.kind, ErrorKind::ServerValidation);
        assert_eq!(error.message, "Invalid OTP");
        assert!(error.field_message("otp").is_some());
    }

    #[test]
    fn status_401_maps_to_authentication() {
        let result = response(401, r#"{"detail":"token expired"}"#);
        let error = api_result::<serde_json::Value>(&result).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Authentication);
    }

    #[test]
    fn status_429_maps_to_rate_limited_with_retry_after() {
        let mut headers = HttpHeaders::new();
        headers.insert("Retry-After", "30").unwrap();
        let result = Ok(HttpResponse::new(429, headers, Vec::new(), "req-1".into()));
        let error = api_result::<serde_json::Value>(&result).unwrap_err();
        assert_eq!(error.kind, ErrorKind::RateLimited);
        assert_eq!(error.retry_after_ms, Some(30_000));
    }

    #[test]
    fn status_500_maps_to_server_error() {
        let result = response(500, "");
        let error = api_result::<serde_json::Value>(&result).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Server);
        assert!(error.is_retryable());
    }

    #[test]
    fn transport_error_maps_to_network() {
        let result = Err(HttpError::Network {
            message: "connection refused".into(),
        });
        let error = api_result::<serde_json::Value>(&result).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Network);
        assert!(error.is_retryable());
    }

    #[test]
    fn nested_details_flatten_with_dotted_paths() {
        let details = serde_json::json!({
            "price": ["Price is required"],
            "contact": {"sellerName": ["This field is required"]}
        });
        let mut out = Vec::new();
        field_errors_from_details(&details, "", &mut out);
        assert!(out.iter().any(|fe| fe.field == "price"));
        assert!(out.iter().any(|fe| fe.field == "contact.sellerName"));
    }

    #[test]
    fn rate_limited_is_not_auto_retryable() {
        let error = AppError::new(ErrorKind::RateLimited, "slow down");
        assert!(!error.is_retryable());
    }

    #[test]
    fn validation_messages_pass_through_verbatim() {
        let error = AppError::validation("Price must be at least 50000");
        assert_eq!(error.user_facing_message(), "Price must be at least 50000");
    }
}
