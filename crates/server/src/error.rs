use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    attachments::AttachmentError, auth::AuthError, backend::BackendError, pdf::PdfError,
    tenant_store::TenantError,
};
use thiserror::Error;
use tracing::{debug, error};
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Tenant(#[from] TenantError),
    #[error(transparent)]
    Pdf(#[from] PdfError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error("not found: {0}")]
    NotFound(String),
}

fn backend_status(error: &BackendError) -> StatusCode {
    match error {
        BackendError::Unauthorized => StatusCode::UNAUTHORIZED,
        BackendError::Forbidden => StatusCode::FORBIDDEN,
        BackendError::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Backend(e)
            | ApiError::Tenant(TenantError::Backend(e))
            | ApiError::Attachment(AttachmentError::Backend(e)) => backend_status(e),
            ApiError::Attachment(AttachmentError::NoAttachments) | ApiError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Tenant(TenantError::DuplicateEntity { .. })
            | ApiError::Pdf(_)
            | ApiError::Attachment(AttachmentError::Archive(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn log(&self, status: StatusCode) {
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", self);
        } else {
            debug!(status = status.as_u16(), "Request rejected: {}", self);
        }
    }

    /// Status-only response for routes that serve files.
    pub fn into_empty_response(self) -> Response {
        let status = self.status_code();
        self.log(status);
        status.into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.log(status);
        let body = ApiResponse::<()>::error(&self.to_string());
        (status, Json(body)).into_response()
    }
}
