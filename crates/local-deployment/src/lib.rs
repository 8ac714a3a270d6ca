use std::sync::Arc;

use async_trait::async_trait;
use deployment::{Deployment, DeploymentError};
use services::services::{
    auth::TokenVerifier,
    backend::{GraphQlBackend, ReportBackend},
    config::Config,
    pdf::{HttpPdfRenderer, PdfOptions, PdfRenderer, PdfService},
    tenant_store::TenantStore,
};
use tracing::info;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    tenant_store: TenantStore,
    backend: Arc<dyn ReportBackend>,
    pdf_service: PdfService,
    token_verifier: Arc<TokenVerifier>,
}

impl LocalDeployment {
    /// Assemble a deployment from explicit collaborators.
    pub fn from_parts(
        config: Config,
        backend: Arc<dyn ReportBackend>,
        renderer: Arc<dyn PdfRenderer>,
    ) -> Result<Self, DeploymentError> {
        let token_verifier =
            TokenVerifier::from_config(&config.auth, &config.tenant.default_tenant)?;
        let pdf_service = PdfService::new(renderer, PdfOptions::from(&config.pdf));

        Ok(Self {
            config: Arc::new(config),
            tenant_store: TenantStore::new(),
            backend,
            pdf_service,
            token_verifier: Arc::new(token_verifier),
        })
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Config::load()?;
        let backend = Arc::new(GraphQlBackend::new(&config.backend)?);
        let renderer = Arc::new(HttpPdfRenderer::new(&config.pdf)?);

        info!(
            graphql_url = %config.backend.graphql_url,
            pdf_service_url = %config.pdf.service_url,
            "Deployment configured"
        );
        Self::from_parts(config, backend, renderer)
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn tenant_store(&self) -> &TenantStore {
        &self.tenant_store
    }

    fn backend(&self) -> Arc<dyn ReportBackend> {
        self.backend.clone()
    }

    fn pdf_service(&self) -> &PdfService {
        &self.pdf_service
    }

    fn token_verifier(&self) -> &TokenVerifier {
        &self.token_verifier
    }
}
