use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use deployment::Deployment;
use models::daily_report::DailyReport;
use services::services::{attachments::bundle, auth::Principal};
use tracing::{error, info};
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::auth::AuthUser};

async fn fetch_report(
    deployment: &DeploymentImpl,
    principal: &Principal,
    id: &str,
) -> Result<DailyReport, ApiError> {
    let not_found = || ApiError::NotFound(format!("daily report {id}"));
    let id: Uuid = id.parse().map_err(|_| not_found())?;
    deployment
        .backend()
        .fetch_daily_report(id, &principal.token)
        .await?
        .ok_or_else(not_found)
}

fn file_response(content_type: &'static str, disposition: String, body: impl Into<Bytes>) -> Response {
    match HeaderValue::from_str(&disposition) {
        Ok(disposition) => (
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            body.into(),
        )
            .into_response(),
        Err(e) => {
            error!("Invalid Content-Disposition {:?}: {}", disposition, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn render_pdf(
    deployment: &DeploymentImpl,
    principal: &Principal,
    id: &str,
) -> Result<Response, ApiError> {
    let report = fetch_report(deployment, principal, id).await?;
    let tenant = deployment.resolve_tenant(principal).await;
    let pdf = deployment
        .pdf_service()
        .generate_daily_report_pdf(&report, &tenant)
        .await?;

    info!(report_id = %report.id, bytes = pdf.len(), "Serving daily report PDF");
    Ok(file_response(
        "application/pdf",
        format!("inline; filename=\"{}\"", report.pdf_file_name()),
        pdf,
    ))
}

async fn bundle_attachments(
    deployment: &DeploymentImpl,
    principal: &Principal,
    id: &str,
) -> Result<Response, ApiError> {
    let report = fetch_report(deployment, principal, id).await?;
    let files = deployment
        .attachment_service()
        .fetch_all(&report, &principal.token)
        .await?;
    let archive = bundle(&files)?;

    info!(report_id = %report.id, files = files.len(), bytes = archive.len(), "Serving attachment bundle");
    Ok(file_response(
        "application/gzip",
        format!("attachment; filename=\"{}-attachments.tar.gz\"", report.file_stem()),
        archive,
    ))
}

/// GET /api/daily-report/{id}/pdf
/// Render the report to PDF. Errors carry no body.
pub async fn get_daily_report_pdf(
    State(deployment): State<DeploymentImpl>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Response {
    render_pdf(&deployment, &principal, &id)
        .await
        .unwrap_or_else(ApiError::into_empty_response)
}

/// GET /api/daily-report/{id}/attachments
/// Every attachment of the report as a gzip-compressed tar archive
pub async fn get_daily_report_attachments(
    State(deployment): State<DeploymentImpl>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Response {
    bundle_attachments(&deployment, &principal, &id)
        .await
        .unwrap_or_else(ApiError::into_empty_response)
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/daily-report/{id}",
        Router::new()
            .route("/pdf", get(get_daily_report_pdf))
            .route("/attachments", get(get_daily_report_attachments)),
    )
}
