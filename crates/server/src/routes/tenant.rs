use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use deployment::Deployment;
use services::services::tenant_store::TenantConfig;
use tracing::info;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::auth::AuthUser};

/// GET /api/tenant/entities
/// Entity labels and attribute rules for the caller's tenant
pub async fn get_tenant_entities(
    State(deployment): State<DeploymentImpl>,
    AuthUser(principal): AuthUser,
) -> Result<ResponseJson<ApiResponse<TenantConfig>>, ApiError> {
    let config = deployment.resolve_tenant(&principal).await;
    Ok(ResponseJson(ApiResponse::success(config.as_ref().clone())))
}

/// POST /api/tenant/refresh
/// Re-fetch the caller's tenant from the backend and replace the cached copy
pub async fn refresh_tenant(
    State(deployment): State<DeploymentImpl>,
    AuthUser(principal): AuthUser,
) -> Result<ResponseJson<ApiResponse<TenantConfig>>, ApiError> {
    let config = deployment
        .tenant_store()
        .refresh(deployment.backend().as_ref(), &principal)
        .await?;
    info!(tenant = %config.name, subject = %principal.subject, "Tenant refreshed");
    Ok(ResponseJson(ApiResponse::success(config.as_ref().clone())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/tenant",
        Router::new()
            .route("/entities", get(get_tenant_entities))
            .route("/refresh", post(refresh_tenant)),
    )
}
