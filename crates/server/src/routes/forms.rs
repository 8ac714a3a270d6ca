use axum::{
    Json, Router, extract::State, response::Json as ResponseJson, routing::post,
};
use models::form_template::{FormValidationReport, ValidateFormRequest};
use services::services::forms::validate_submission;
use tracing::info;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::auth::AuthUser};

/// POST /api/forms/validate
pub async fn validate_form(
    State(_deployment): State<DeploymentImpl>,
    AuthUser(principal): AuthUser,
    Json(payload): Json<ValidateFormRequest>,
) -> Result<ResponseJson<ApiResponse<FormValidationReport>>, ApiError> {
    let report = validate_submission(&payload.template, &payload.values);
    info!(
        tenant = %principal.tenant,
        template_id = %payload.template.id,
        valid = report.valid,
        "Form validated"
    );
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/forms/validate", post(validate_form))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::StatusCode};
    use serde_json::json;

    use crate::test_support::{
        FakeBackend, bearer, body_json, pdf_bytes, request, send, test_deployment,
    };

    fn payload(values: serde_json::Value) -> Body {
        Body::from(
            json!({
                "template": {
                    "id": "3d2b0a3c-7f3e-4c1c-8f53-0d1f4a7b9e21",
                    "name": "Pre-job briefing",
                    "fields": [
                        { "id": "supervisor", "label": "Supervisor", "kind": "text", "required": true },
                        { "id": "crewSize", "label": "Crew size", "kind": "integer", "min": 1, "max": 50 }
                    ]
                },
                "values": values
            })
            .to_string(),
        )
    }

    async fn validate(body: Body) -> axum::response::Response {
        send(
            test_deployment(FakeBackend::with_report(None), Ok(pdf_bytes())),
            request("POST", "/api/forms/validate", Some(&bearer("acme")), body),
        )
        .await
    }

    #[tokio::test]
    async fn test_valid_submission() {
        let response = validate(payload(json!({ "supervisor": "Jordan", "crewSize": "6" }))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["valid"], true);
        assert_eq!(json["data"]["unknownFields"], json!([]));
    }

    #[tokio::test]
    async fn test_invalid_submission_lists_field_errors() {
        let response = validate(payload(json!({ "crewSize": "0" }))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["data"]["valid"], false);
        let fields = json["data"]["fields"].as_array().unwrap();
        assert_eq!(fields[0]["errors"], json!(["This field is required"]));
        assert_eq!(fields[1]["errors"], json!(["must be between 1 and 50"]));
        assert_eq!(fields[1]["raw"], "0");
    }

    #[tokio::test]
    async fn test_requires_a_token() {
        let response = send(
            test_deployment(FakeBackend::with_report(None), Ok(pdf_bytes())),
            request("POST", "/api/forms/validate", None, payload(json!({}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let response = validate(Body::from("{\"template\": 1}")).await;
        assert!(response.status().is_client_error());
    }
}
