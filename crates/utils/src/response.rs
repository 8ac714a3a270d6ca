use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Envelope returned by every JSON route.
#[derive(Debug, Serialize, Deserialize, TS)]
pub struct ApiResponse<T, E = T> {
    success: bool,
    data: Option<T>,
    error_data: Option<E>,
    message: Option<String>,
}

impl<T, E> ApiResponse<T, E> {
    /// Creates a successful response, with `data` and no message.
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            message: None,
            error_data: None,
        }
    }

    /// Creates an error response, with `message` and no data.
    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            message: Some(message.to_string()),
            error_data: None,
        }
    }

    /// Creates an error response carrying structured error data.
    pub fn error_with_data(data: E) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error_data: Some(data),
            message: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_serializes_data() {
        let response: ApiResponse<u32> = ApiResponse::success(7);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 7);
        assert!(json["message"].is_null());
    }

    #[test]
    fn test_error_has_message_and_no_data() {
        let response: ApiResponse<()> = ApiResponse::error("not found");
        assert!(!response.is_success());
        assert_eq!(response.message(), Some("not found"));
        assert!(response.into_data().is_none());
    }
}
