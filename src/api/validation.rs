use actix_web::HttpResponse;
use serde::Serialize;
use validator::ValidationErrors;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

/// Collect per-field validation messages as `{field: {"errors": [...]}}`
pub fn field_errors(validation_errors: &ValidationErrors) -> serde_json::Value {
    let mut fields = serde_json::Map::new();

    for (field, errors) in validation_errors.field_errors() {
        let messages: Vec<String> = errors
            .iter()
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Validation error in field: {}", field))
            })
            .collect();
        fields.insert(field.to_string(), serde_json::json!({"errors": messages}));
    }

    serde_json::Value::Object(fields)
}

/// Creates a configured PathConfig with standardized error handling for the entire project
pub fn path_config() -> actix_web_validator::PathConfig {
    actix_web_validator::PathConfig::default().error_handler(|err, _req| {
        let error_response = match err {
            actix_web_validator::Error::Validate(validation_errors) => ErrorResponse {
                error: "Validation failed".to_string(),
                fields: field_errors(&validation_errors),
            },
            _ => ErrorResponse {
                error: "Request validation failed".to_string(),
                fields: serde_json::json!({"message": "Invalid path parameter"}),
            },
        };

        actix_web::error::InternalError::from_response(
            "",
            HttpResponse::BadRequest().json(error_response),
        )
        .into()
    })
}
