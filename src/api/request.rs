use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{codes, ApiError};

/// Field-level checks run on a request body after it deserializes.
pub trait Validate {
    fn validate(&self, errors: &mut FieldErrors);
}

#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "must not be empty");
        }
    }

    pub fn max_length(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("must be at most {} characters", max));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// JSON body that failed neither deserialization nor [`Validate`].
/// Both failures answer 422.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                ApiError::unprocessable_entity(rejection.body_text(), HashMap::new())
            })?;

        let mut errors = FieldErrors::default();
        value.validate(&mut errors);
        if !errors.is_empty() {
            return Err(ApiError::unprocessable_entity("Validation failed", errors.0));
        }
        Ok(ValidJson(value))
    }
}

/// Parses a path segment as a record id; malformed ids answer 400.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::coded(StatusCode::BAD_REQUEST, codes::REQUEST_ID_INVALID, format!("Invalid id: {}", raw))
    })
}

pub fn password_strength(errors: &mut FieldErrors, field: &str, password: &str) {
    let long_enough = password.chars().count() >= 8;
    let upper = password.chars().any(|c| c.is_ascii_uppercase());
    let lower = password.chars().any(|c| c.is_ascii_lowercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if !(long_enough && upper && lower && digit) {
        errors.add(field, "must be at least 8 characters with upper, lower case letters and a number");
    }
}
