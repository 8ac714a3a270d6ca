//! Daily report PDF generation.
//!
//! Rendering happens here; turning HTML into PDF is delegated to an external
//! headless-browser service that accepts the page body plus separate header
//! and footer templates.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use bytes::Bytes;
use models::daily_report::DailyReport;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    config::PdfConfig,
    render::render_component_to_html_string_inline_styles,
    report_templates::{
        DailyReportDocument, FOOTER_CSS, HEADER_CSS, REPORT_CSS, ReportFooter, ReportHeader,
    },
    tenant_store::TenantConfig,
};

const PDF_SIGNATURE: &[u8] = b"%PDF-";

#[derive(Debug, Clone, Error)]
pub enum PdfError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("pdf service returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("failed to render {0}")]
    Render(&'static str),
    #[error("pdf service returned an unusable document: {0}")]
    InvalidOutput(&'static str),
}

impl PdfError {
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfMargins {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfOptions {
    pub format: String,
    pub landscape: bool,
    pub print_background: bool,
    pub display_header_footer: bool,
    pub margin: PdfMargins,
}

impl From<&PdfConfig> for PdfOptions {
    fn from(config: &PdfConfig) -> Self {
        Self {
            format: config.format.clone(),
            landscape: config.landscape,
            print_background: true,
            display_header_footer: true,
            margin: PdfMargins {
                top: config.margin_top.clone(),
                right: config.margin_right.clone(),
                bottom: config.margin_bottom.clone(),
                left: config.margin_left.clone(),
            },
        }
    }
}

/// Body sent to the PDF service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfRenderRequest {
    pub html: String,
    pub header_template: String,
    pub footer_template: String,
    pub options: PdfOptions,
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, request: &PdfRenderRequest) -> Result<Bytes, PdfError>;
}

#[derive(Debug, Clone)]
pub struct HttpPdfRenderer {
    http: Client,
    url: String,
}

impl HttpPdfRenderer {
    pub fn new(config: &PdfConfig) -> Result<Self, PdfError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PdfError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url: config.service_url.clone(),
        })
    }

    async fn send(&self, request: &PdfRenderRequest) -> Result<Bytes, PdfError> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                PdfError::Timeout
            } else {
                PdfError::Transport(e.to_string())
            }
        };

        let res = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(map_err)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PdfError::Http {
                status: status.as_u16(),
                body,
            });
        }

        res.bytes().await.map_err(map_err)
    }
}

#[async_trait]
impl PdfRenderer for HttpPdfRenderer {
    async fn render(&self, request: &PdfRenderRequest) -> Result<Bytes, PdfError> {
        (|| async { self.send(request).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_delay(Duration::from_secs(8))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &PdfError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "PDF service call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }
}

/// Reject output that cannot be served as a PDF.
pub fn ensure_pdf(bytes: Bytes) -> Result<Bytes, PdfError> {
    if bytes.is_empty() {
        return Err(PdfError::InvalidOutput("empty document"));
    }
    if !bytes.starts_with(PDF_SIGNATURE) {
        return Err(PdfError::InvalidOutput("missing %PDF- signature"));
    }
    Ok(bytes)
}

#[derive(Clone)]
pub struct PdfService {
    renderer: Arc<dyn PdfRenderer>,
    options: PdfOptions,
}

impl PdfService {
    pub fn new(renderer: Arc<dyn PdfRenderer>, options: PdfOptions) -> Self {
        Self { renderer, options }
    }

    pub async fn generate_daily_report_pdf(
        &self,
        report: &DailyReport,
        tenant: &TenantConfig,
    ) -> Result<Bytes, PdfError> {
        let html = render_component_to_html_string_inline_styles(
            &DailyReportDocument::new(report, tenant),
            REPORT_CSS,
        )
        .ok_or(PdfError::Render("report body"))?;
        let header_template = render_component_to_html_string_inline_styles(
            &ReportHeader::new(report, tenant),
            HEADER_CSS,
        )
        .ok_or(PdfError::Render("report header"))?;
        let footer_template =
            render_component_to_html_string_inline_styles(&ReportFooter, FOOTER_CSS)
                .ok_or(PdfError::Render("report footer"))?;

        let request = PdfRenderRequest {
            html,
            header_template,
            footer_template,
            options: self.options.clone(),
        };

        info!(report_id = %report.id, tenant = %tenant.name, "Rendering daily report PDF");
        let pdf = ensure_pdf(self.renderer.render(&request).await?)?;
        debug!(report_id = %report.id, bytes = pdf.len(), "Daily report PDF ready");
        Ok(pdf)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::services::report_templates::tests::{acme_tenant, sample_report};

    struct FakeRenderer {
        response: Result<Bytes, PdfError>,
        seen: Mutex<Vec<PdfRenderRequest>>,
    }

    impl FakeRenderer {
        fn returning(response: Result<Bytes, PdfError>) -> Arc<Self> {
            Arc::new(Self {
                response,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PdfRenderer for FakeRenderer {
        async fn render(&self, request: &PdfRenderRequest) -> Result<Bytes, PdfError> {
            self.seen.lock().unwrap().push(request.clone());
            self.response.clone()
        }
    }

    fn service(renderer: Arc<FakeRenderer>) -> PdfService {
        PdfService::new(renderer, PdfOptions::from(&PdfConfig::default()))
    }

    #[tokio::test]
    async fn test_generate_sends_inlined_templates_once() {
        let renderer = FakeRenderer::returning(Ok(Bytes::from_static(b"%PDF-1.7\n...")));
        let pdf = service(renderer.clone())
            .generate_daily_report_pdf(&sample_report(), &acme_tenant())
            .await
            .unwrap();
        assert!(pdf.starts_with(b"%PDF-"));

        let seen = renderer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let request = &seen[0];
        assert!(request.html.contains("<h1 style="));
        assert!(!request.html.contains("<body"));
        assert!(request.header_template.contains("Acme Utilities | Daily Log"));
        assert!(request.footer_template.contains(r#"class="pageNumber""#));
        assert_eq!(request.options.format, "Letter");
        assert!(request.options.display_header_footer);
    }

    #[tokio::test]
    async fn test_empty_output_is_an_error() {
        let renderer = FakeRenderer::returning(Ok(Bytes::new()));
        let err = service(renderer)
            .generate_daily_report_pdf(&sample_report(), &acme_tenant())
            .await
            .unwrap_err();
        assert!(matches!(err, PdfError::InvalidOutput("empty document")));
    }

    #[tokio::test]
    async fn test_non_pdf_output_is_an_error() {
        let renderer = FakeRenderer::returning(Ok(Bytes::from_static(b"<html>oops</html>")));
        let err = service(renderer)
            .generate_daily_report_pdf(&sample_report(), &acme_tenant())
            .await
            .unwrap_err();
        assert!(matches!(err, PdfError::InvalidOutput(_)));
    }

    #[tokio::test]
    async fn test_renderer_errors_propagate() {
        let renderer = FakeRenderer::returning(Err(PdfError::Http {
            status: 400,
            body: "bad margins".to_string(),
        }));
        let err = service(renderer)
            .generate_daily_report_pdf(&sample_report(), &acme_tenant())
            .await
            .unwrap_err();
        assert!(matches!(err, PdfError::Http { status: 400, .. }));
        assert!(!err.should_retry());
    }

    #[test]
    fn test_should_retry() {
        assert!(PdfError::Timeout.should_retry());
        assert!(PdfError::Http { status: 503, body: String::new() }.should_retry());
        assert!(PdfError::Http { status: 429, body: String::new() }.should_retry());
        assert!(!PdfError::InvalidOutput("empty document").should_retry());
    }

    #[test]
    fn test_request_serializes_for_pdf_service() {
        let request = PdfRenderRequest {
            html: "<p>x</p>".to_string(),
            header_template: String::new(),
            footer_template: String::new(),
            options: PdfOptions::from(&PdfConfig::default()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["headerTemplate"], "");
        assert_eq!(json["options"]["printBackground"], true);
        assert_eq!(json["options"]["margin"]["top"], "0.9in");
    }
}
