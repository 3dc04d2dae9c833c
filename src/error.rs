use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use thiserror::Error;

/// Field-scoped validation messages, reported all at once.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Field errors under a caller-chosen summary message.
    #[error("{message}")]
    Invalid { message: String, errors: FieldErrors },

    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized(String),

    #[error("Admin privileges required")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        ApiError::Validation(errors)
    }

    pub fn invalid(message: impl Into<String>, errors: FieldErrors) -> Self {
        ApiError::Invalid { message: message.into(), errors }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected JSON body: {}", rejection.body_text());
        ApiError::BadRequest(format!("Geçersiz JSON gövdesi: {}", rejection.body_text()))
    }
}

/// `Json` whose rejections use the API error body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": "Girilen bilgilerde hata var.", "errors": errors }),
            ),
            ApiError::Invalid { message, errors } => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": message, "errors": errors }),
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": message }),
            ),
            ApiError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                json!({ "success": false, "message": message }),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "success": false, "message": "Bu işlem için yönetici yetkisi gerekli." }),
            ),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "message": message }),
            ),
            ApiError::Conflict(message) => (
                StatusCode::CONFLICT,
                json!({ "success": false, "message": message }),
            ),
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": "Sunucu hatası oluştu." }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_accumulate_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("telefon", "a");
        errors.add("telefon", "b");
        errors.add("ad", "c");
        assert_eq!(errors.get("telefon").map(<[String]>::len), Some(2));
        let body = serde_json::to_value(&errors).unwrap();
        assert_eq!(body["ad"][0], "c");
    }

    #[test]
    fn empty_errors_pass() {
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
