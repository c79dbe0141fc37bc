pub mod analytics;
pub mod auth;
pub mod health;
pub mod live;
pub mod notifications;
pub mod tasks;
pub mod users;

use serde::Serialize;
use validator::Validate;

use crate::error::{AppError, AppErrorWithDetails};

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

/// Run `validator` rules on a request body. Failures become a 422 whose
/// details list every offending field.
pub(crate) fn validate_request<T: Validate>(request: &T) -> Result<(), AppErrorWithDetails> {
    request.validate().map_err(|e| {
        let mut errors: Vec<FieldError> = e
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| FieldError {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));

        let summary = errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Validation failed".to_string());

        AppError::Validation(summary).with_details(serde_json::json!({ "fields": errors }))
    })
}
