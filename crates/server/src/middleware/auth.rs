use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::Response,
};
use deployment::Deployment;
use services::services::auth::{AuthError, Principal};

use crate::{DeploymentImpl, error::ApiError};

/// The verified caller. Rejects with a bare 401 so file routes keep an
/// empty error body.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl FromRequestParts<DeploymentImpl> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| value.to_str().map_err(|_| AuthError::MalformedHeader))
            .transpose();

        header
            .and_then(|header| deployment.token_verifier().authenticate(header))
            .map(AuthUser)
            .map_err(|e| ApiError::from(e).into_empty_response())
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{HeaderValue, Request, StatusCode, header::AUTHORIZATION},
    };

    use super::*;
    use crate::test_support::{FakeBackend, bearer, body_bytes, pdf_bytes, test_deployment};

    async fn extract(authorization: Option<HeaderValue>) -> Result<AuthUser, Response> {
        let deployment = test_deployment(FakeBackend::with_report(None), Ok(pdf_bytes()));
        let mut request = Request::builder().uri("/api/tenant/entities");
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        let (mut parts, _) = request.body(Body::empty()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, &deployment).await
    }

    #[tokio::test]
    async fn test_valid_token_yields_principal() {
        let value = HeaderValue::from_str(&bearer("acme")).unwrap();
        let AuthUser(principal) = extract(Some(value)).await.unwrap();
        assert_eq!(principal.tenant, "acme");
        assert_eq!(principal.subject, "user-1");
    }

    #[tokio::test]
    async fn test_rejections_are_empty_401s() {
        let cases = [
            None,
            Some(HeaderValue::from_static("Basic dXNlcjpwYXNz")),
            Some(HeaderValue::from_static("Bearer not-a-jwt")),
            Some(HeaderValue::from_bytes(b"Bearer \xff").unwrap()),
        ];
        for authorization in cases {
            let response = extract(authorization).await.unwrap_err();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(body_bytes(response).await.is_empty());
        }
    }
}
