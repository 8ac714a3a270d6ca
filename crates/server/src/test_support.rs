//! Fakes for driving the router in tests.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{Request, Response, header::AUTHORIZATION},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use models::{daily_report::DailyReport, tenant::TenantDefinition};
use services::services::{
    backend::{BackendError, ReportBackend},
    config::Config,
    pdf::{PdfError, PdfRenderRequest, PdfRenderer},
};
use tower::ServiceExt;
use uuid::Uuid;

use crate::{DeploymentImpl, routes};

pub(crate) const SECRET: &str = "route-test-secret";

pub(crate) const REPORT_ID: &str = "6f1c2d1e-3b0a-4b59-9a55-2f5b7d6c9e10";

pub(crate) fn sample_report() -> DailyReport {
    serde_json::from_value(serde_json::json!({
        "id": REPORT_ID,
        "status": "COMPLETE",
        "workPackage": {
            "id": "0b5e8f44-8f0e-4a51-8c43-9f2a8e0b6c11",
            "name": "Main St. Gas Line"
        },
        "createdAt": "2024-05-02T12:00:00Z",
        "completedAt": "2024-05-03T21:15:00Z",
        "attachments": [
            { "name": "photo.jpg", "url": "https://files.example.com/1", "kind": "PHOTO" },
            { "name": "photo.jpg", "url": "https://files.example.com/2", "kind": "PHOTO" }
        ]
    }))
    .unwrap()
}

pub(crate) fn acme_definition() -> TenantDefinition {
    serde_json::from_value(serde_json::json!({
        "name": "acme",
        "displayName": "Acme Utilities",
        "entities": [{
            "key": "workPackage",
            "label": "Project",
            "labelPlural": "Projects",
            "defaultLabel": "Work Package",
            "defaultLabelPlural": "Work Packages"
        }]
    }))
    .unwrap()
}

pub(crate) struct FakeBackend {
    pub(crate) tenant: Result<TenantDefinition, BackendError>,
    pub(crate) report: Result<Option<DailyReport>, BackendError>,
}

impl FakeBackend {
    pub(crate) fn with_report(report: Option<DailyReport>) -> Self {
        Self {
            tenant: Ok(acme_definition()),
            report: Ok(report),
        }
    }

    pub(crate) fn failing(error: BackendError) -> Self {
        Self {
            tenant: Err(error.clone()),
            report: Err(error),
        }
    }
}

#[async_trait]
impl ReportBackend for FakeBackend {
    async fn fetch_tenant(&self, _token: &str) -> Result<TenantDefinition, BackendError> {
        self.tenant.clone()
    }

    async fn fetch_daily_report(
        &self,
        id: Uuid,
        _token: &str,
    ) -> Result<Option<DailyReport>, BackendError> {
        self.report
            .clone()
            .map(|report| report.filter(|r| r.id == id))
    }

    async fn download_attachment(&self, url: &str, _token: &str) -> Result<Bytes, BackendError> {
        Ok(Bytes::from(format!("bytes of {url}")))
    }
}

pub(crate) struct FakeRenderer {
    pub(crate) output: Result<Bytes, PdfError>,
}

#[async_trait]
impl PdfRenderer for FakeRenderer {
    async fn render(&self, _request: &PdfRenderRequest) -> Result<Bytes, PdfError> {
        self.output.clone()
    }
}

pub(crate) fn pdf_bytes() -> Bytes {
    Bytes::from_static(b"%PDF-1.7\n%fake\n%%EOF")
}

pub(crate) fn test_deployment(backend: FakeBackend, output: Result<Bytes, PdfError>) -> DeploymentImpl {
    let mut config = Config::default();
    config.auth.secret = Some(SECRET.to_string());
    DeploymentImpl::from_parts(
        config,
        Arc::new(backend),
        Arc::new(FakeRenderer { output }),
    )
    .unwrap()
}

pub(crate) fn bearer(tenant: &str) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 600;
    let token = encode(
        &Header::default(),
        &serde_json::json!({ "sub": "user-1", "exp": exp, "tenant": tenant }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

pub(crate) fn request(method: &str, uri: &str, authorization: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(authorization) = authorization {
        builder = builder.header(AUTHORIZATION, authorization);
    }
    builder.body(body).unwrap()
}

pub(crate) async fn send(deployment: DeploymentImpl, request: Request<Body>) -> Response<Body> {
    routes::router(deployment).oneshot(request).await.unwrap()
}

pub(crate) async fn body_bytes(response: Response<Body>) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub(crate) async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
