use std::sync::Arc;

use async_trait::async_trait;
use services::services::{
    attachments::AttachmentService,
    auth::{AuthError, Principal, TokenVerifier},
    backend::{BackendError, ReportBackend},
    config::{Config, ConfigError},
    pdf::{PdfError, PdfService},
    tenant_store::{TenantConfig, TenantStore},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Pdf(#[from] PdfError),
}

/// Everything a request handler needs, shared across the router as state.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn tenant_store(&self) -> &TenantStore;

    fn backend(&self) -> Arc<dyn ReportBackend>;

    fn pdf_service(&self) -> &PdfService;

    fn token_verifier(&self) -> &TokenVerifier;

    fn attachment_service(&self) -> AttachmentService {
        AttachmentService::new(self.backend())
    }

    /// Tenant configuration for the caller, loading it on first use.
    async fn resolve_tenant(&self, principal: &Principal) -> Arc<TenantConfig> {
        debug!(tenant = %principal.tenant, "Resolving tenant configuration");
        self.tenant_store()
            .resolve(self.backend().as_ref(), principal)
            .await
    }
}
