use time::Date;
use validator::{Validate, ValidationErrors};

use crate::api::errors::ApiError;
use crate::core::time::parse_calendar_date;

/// Runs the derived validators and reports the first failing field's message.
pub(crate) fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(|errors| ApiError::BadRequest(first_message(&errors)))
}

fn first_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .find_map(|(field, field_errors)| {
            field_errors.first().map(|error| match &error.message {
                Some(message) => message.to_string(),
                None => format!("Invalid value for {field}"),
            })
        })
        .unwrap_or_else(|| "Invalid request".to_string())
}

pub(crate) fn parse_date_field(raw: &str, field: &str) -> Result<Date, ApiError> {
    parse_calendar_date(raw).ok_or_else(|| ApiError::BadRequest(format!("Invalid {field}")))
}

pub(crate) fn parse_optional_date(raw: Option<&str>, field: &str) -> Result<Option<Date>, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_date_field(value, field).map(Some),
        None => Ok(None),
    }
}

/// Trims and drops blank strings.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
