//! Client for the Worker Safety GraphQL backend.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use bytes::Bytes;
use models::{daily_report::DailyReport, tenant::TenantDefinition};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::BackendConfig;

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("unauthenticated")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("graphql error: {0}")]
    GraphQl(String),
    #[error("json error: {0}")]
    Serde(String),
}

impl BackendError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// What the report service needs from the backend. Every call runs with the
/// caller's bearer token.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    async fn fetch_tenant(&self, token: &str) -> Result<TenantDefinition, BackendError>;

    /// `Ok(None)` when the report does not exist.
    async fn fetch_daily_report(
        &self,
        id: Uuid,
        token: &str,
    ) -> Result<Option<DailyReport>, BackendError>;

    async fn download_attachment(&self, url: &str, token: &str) -> Result<Bytes, BackendError>;
}

const TENANT_QUERY: &str = r#"
query TenantEntities {
  tenantSettings {
    name
    displayName
    entities {
      key label labelPlural defaultLabel defaultLabelPlural
      attributes {
        key label labelPlural defaultLabel defaultLabelPlural
        visible required filterable mandatory mappings
      }
    }
  }
}
"#;

const DAILY_REPORT_QUERY: &str = r#"
query DailyReport($id: UUID!) {
  dailyReport(id: $id) {
    id status createdAt completedAt
    workPackage { id name externalKey address }
    location { id name }
    createdBy { id name }
    sections {
      workSchedule { startDatetime endDatetime }
      jobHazardAnalysis {
        name riskLevel notes
        hazards { name isApplicable controls { name implemented notImplementedReason furtherExplanation } }
      }
      siteConditions {
        name isApplicable
        hazards { name isApplicable controls { name implemented notImplementedReason furtherExplanation } }
      }
      crew { name role }
      additionalInformation
    }
    attachments { name url kind size }
  }
}
"#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRequest<'a> {
    query: &'a str,
    operation_name: &'a str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Clone, Deserialize)]
struct GraphQlErrorExtensions {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TenantSettingsData {
    tenant_settings: TenantDefinition,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyReportData {
    daily_report: Option<DailyReport>,
}

/// Map GraphQL error codes onto transport-independent errors.
fn classify_errors(errors: &[GraphQlError]) -> BackendError {
    let code_of = |e: &GraphQlError| {
        e.extensions
            .as_ref()
            .and_then(|x| x.code.as_deref())
            .map(str::to_ascii_uppercase)
    };

    for error in errors {
        match code_of(error).as_deref() {
            Some("UNAUTHENTICATED") => return BackendError::Unauthorized,
            Some("FORBIDDEN") => return BackendError::Forbidden,
            Some("NOT_FOUND") => return BackendError::NotFound,
            _ => {}
        }
    }

    BackendError::GraphQl(
        errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; "),
    )
}

fn status_error(status: StatusCode, body: String) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED => BackendError::Unauthorized,
        StatusCode::FORBIDDEN => BackendError::Forbidden,
        StatusCode::NOT_FOUND => BackendError::NotFound,
        s => BackendError::Http {
            status: s.as_u16(),
            body,
        },
    }
}

fn map_reqwest_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Transport(e.to_string())
    }
}

fn retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(3)
        .with_jitter()
}

/// [`ReportBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct GraphQlBackend {
    http: Client,
    url: String,
}

impl GraphQlBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("worker-safety-reports/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: config.graphql_url.clone(),
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        token: &str,
        operation_name: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, BackendError> {
        let request = GraphQlRequest {
            query,
            operation_name,
            variables,
        };

        (|| async { self.send(token, &request).await })
            .retry(retry_policy())
            .when(|e: &BackendError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    operation = operation_name,
                    "GraphQL call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        token: &str,
        request: &GraphQlRequest<'_>,
    ) -> Result<T, BackendError> {
        let res = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let body: GraphQlResponse<T> = res
            .json()
            .await
            .map_err(|e| BackendError::Serde(e.to_string()))?;

        if !body.errors.is_empty() {
            return Err(classify_errors(&body.errors));
        }

        body.data
            .ok_or_else(|| BackendError::Serde("response has neither data nor errors".to_string()))
    }
}

#[async_trait]
impl ReportBackend for GraphQlBackend {
    async fn fetch_tenant(&self, token: &str) -> Result<TenantDefinition, BackendError> {
        let data: TenantSettingsData = self
            .execute(token, "TenantEntities", TENANT_QUERY, serde_json::json!({}))
            .await?;
        debug!(
            tenant = %data.tenant_settings.name,
            entities = data.tenant_settings.entities.len(),
            "Fetched tenant settings"
        );
        Ok(data.tenant_settings)
    }

    async fn fetch_daily_report(
        &self,
        id: Uuid,
        token: &str,
    ) -> Result<Option<DailyReport>, BackendError> {
        let result: Result<DailyReportData, _> = self
            .execute(
                token,
                "DailyReport",
                DAILY_REPORT_QUERY,
                serde_json::json!({ "id": id }),
            )
            .await;

        match result {
            Ok(data) => Ok(data.daily_report),
            Err(BackendError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn download_attachment(&self, url: &str, token: &str) -> Result<Bytes, BackendError> {
        let fetch = || async {
            let res = self
                .http
                .get(url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(map_reqwest_error)?;
            let status = res.status();
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(status_error(status, body));
            }
            res.bytes().await.map_err(map_reqwest_error)
        };

        fetch
            .retry(retry_policy())
            .when(|e: &BackendError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    url,
                    "Attachment download failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str, code: Option<&str>) -> GraphQlError {
        GraphQlError {
            message: message.to_string(),
            extensions: Some(GraphQlErrorExtensions {
                code: code.map(str::to_string),
            }),
        }
    }

    #[test]
    fn test_classify_errors_prefers_known_codes() {
        let errors = vec![error("boom", None), error("nope", Some("forbidden"))];
        assert!(matches!(classify_errors(&errors), BackendError::Forbidden));

        let errors = vec![error("who are you", Some("UNAUTHENTICATED"))];
        assert!(matches!(classify_errors(&errors), BackendError::Unauthorized));
    }

    #[test]
    fn test_classify_errors_joins_messages() {
        let errors = vec![error("first", None), error("second", Some("INTERNAL"))];
        match classify_errors(&errors) {
            BackendError::GraphQl(message) => assert_eq!(message, "first; second"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, String::new()),
            BackendError::Forbidden
        ));
        let err = status_error(StatusCode::BAD_GATEWAY, "upstream".to_string());
        assert!(err.should_retry());
        assert!(!status_error(StatusCode::BAD_REQUEST, String::new()).should_retry());
    }

    #[test]
    fn test_graphql_response_parses_null_report() {
        let body: GraphQlResponse<DailyReportData> =
            serde_json::from_str(r#"{"data":{"dailyReport":null}}"#).unwrap();
        assert!(body.errors.is_empty());
        assert!(body.data.unwrap().daily_report.is_none());
    }

    #[test]
    fn test_request_serializes_operation_name() {
        let request = GraphQlRequest {
            query: TENANT_QUERY,
            operation_name: "TenantEntities",
            variables: serde_json::json!({}),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["operationName"], "TenantEntities");
    }
}
