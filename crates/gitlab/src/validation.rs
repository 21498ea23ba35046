//! Credential validation against `GET /api/v4/user`.
//!
//! Validation never fails: every outcome, including transport problems, is
//! folded into a [`ValidationResult`] with a typed [`ValidationErrorCode`].

use serde::Serialize;

use crate::api::{parse_base_url, GitLabApi, GitLabApiError};

/// Closed set of reasons a credential failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorCode {
    InvalidUrl,
    InvalidToken,
    InsufficientPermissions,
    NotFound,
    ApiError,
    Timeout,
    NetworkError,
    UnknownError,
}

impl ValidationErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::InvalidToken => "invalid_token",
            Self::InsufficientPermissions => "insufficient_permissions",
            Self::NotFound => "not_found",
            Self::ApiError => "api_error",
            Self::Timeout => "timeout",
            Self::NetworkError => "network_error",
            Self::UnknownError => "unknown_error",
        }
    }
}

/// Outcome of a validation attempt. Only `is_valid` is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: Option<String>,
    pub error_code: Option<ValidationErrorCode>,
    pub username: Option<String>,
}

impl ValidationResult {
    pub const SUCCESS_MESSAGE: &'static str = "Credentials validated successfully";

    fn valid(username: String) -> Self {
        Self {
            is_valid: true,
            message: Some(Self::SUCCESS_MESSAGE.to_string()),
            error_code: None,
            username: Some(username),
        }
    }

    fn invalid(code: ValidationErrorCode, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
            error_code: Some(code),
            username: None,
        }
    }
}

impl GitLabApi {
    /// Check that `token` authenticates against the instance at `base_url`.
    pub async fn validate_credential(&self, base_url: &str, token: &str) -> ValidationResult {
        if let Err(err) = parse_base_url(base_url) {
            tracing::warn!(error = %err, "Rejected GitLab URL before validation");
            return ValidationResult::invalid(
                ValidationErrorCode::InvalidUrl,
                "Invalid GitLab URL format",
            );
        }

        match self.current_user(base_url, token).await {
            Ok(user) => {
                tracing::info!(gitlab_username = %user.username, "GitLab credential validated");
                ValidationResult::valid(user.username)
            }
            Err(err) => {
                let result = classify_failure(&err);
                tracing::warn!(
                    error = %err,
                    code = result.error_code.map(ValidationErrorCode::as_str),
                    "GitLab credential validation failed",
                );
                result
            }
        }
    }
}

fn classify_failure(err: &GitLabApiError) -> ValidationResult {
    use ValidationErrorCode as Code;

    match err {
        GitLabApiError::InvalidUrl(_) => {
            ValidationResult::invalid(Code::InvalidUrl, "Invalid GitLab URL format")
        }
        GitLabApiError::ApiError { status: 401, .. } => ValidationResult::invalid(
            Code::InvalidToken,
            "Invalid access token or token expired",
        ),
        GitLabApiError::ApiError { status: 403, .. } => ValidationResult::invalid(
            Code::InsufficientPermissions,
            "Token lacks required permissions",
        ),
        GitLabApiError::ApiError { status: 404, .. } => ValidationResult::invalid(
            Code::NotFound,
            "GitLab API endpoint not found - check URL",
        ),
        GitLabApiError::ApiError { status, .. } => {
            ValidationResult::invalid(Code::ApiError, format!("GitLab API error: {status}"))
        }
        GitLabApiError::Request(e) if e.is_timeout() => ValidationResult::invalid(
            Code::Timeout,
            "Connection timeout - GitLab instance unreachable",
        ),
        GitLabApiError::Request(e) if e.is_connect() || e.is_request() => {
            ValidationResult::invalid(
                Code::NetworkError,
                "Network error - could not reach GitLab instance",
            )
        }
        GitLabApiError::Request(_) => {
            ValidationResult::invalid(Code::UnknownError, "Unexpected error during validation")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn api() -> GitLabApi {
        GitLabApi::new(Duration::from_secs(2)).unwrap()
    }

    async fn server_answering(status: u16, body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/user"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn ok_response_yields_username() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/user"))
            .and(header("PRIVATE-TOKEN", "glpat-good"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 7, "username": "octo", "name": "Octo Cat"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = api()
            .validate_credential(&format!("{}/", server.uri()), "glpat-good")
            .await;

        assert!(result.is_valid);
        assert_eq!(result.username.as_deref(), Some("octo"));
        assert_eq!(result.error_code, None);
        assert_eq!(
            result.message.as_deref(),
            Some(ValidationResult::SUCCESS_MESSAGE)
        );
    }

    #[tokio::test]
    async fn unauthorized_is_invalid_token() {
        let server = server_answering(401, json!({"message": "401 Unauthorized"})).await;
        let result = api().validate_credential(&server.uri(), "glpat-bad").await;
        assert!(!result.is_valid);
        assert_eq!(result.error_code, Some(ValidationErrorCode::InvalidToken));
    }

    #[tokio::test]
    async fn status_codes_map_to_error_codes() {
        let cases = [
            (403, ValidationErrorCode::InsufficientPermissions),
            (404, ValidationErrorCode::NotFound),
            (500, ValidationErrorCode::ApiError),
        ];
        for (status, expected) in cases {
            let server = server_answering(status, json!({})).await;
            let result = api().validate_credential(&server.uri(), "t").await;
            assert_eq!(result.error_code, Some(expected), "status {status}");
        }
    }

    #[tokio::test]
    async fn api_error_message_carries_status() {
        let server = server_answering(502, json!({})).await;
        let result = api().validate_credential(&server.uri(), "t").await;
        assert_eq!(result.message.as_deref(), Some("GitLab API error: 502"));
    }

    #[tokio::test]
    async fn malformed_url_is_rejected_without_a_request() {
        let result = api().validate_credential("gitlab.example.com", "t").await;
        assert_eq!(result.error_code, Some(ValidationErrorCode::InvalidUrl));
        assert_eq!(result.message.as_deref(), Some("Invalid GitLab URL format"));
    }

    #[tokio::test]
    async fn slow_instance_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/user"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 1, "username": "late"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let api = GitLabApi::new(Duration::from_millis(200)).unwrap();
        let result = api.validate_credential(&server.uri(), "t").await;
        assert_eq!(result.error_code, Some(ValidationErrorCode::Timeout));
    }

    #[tokio::test]
    async fn unreachable_instance_is_network_error() {
        // Port 1 on loopback refuses connections.
        let result = api().validate_credential("http://127.0.0.1:1", "t").await;
        assert_eq!(result.error_code, Some(ValidationErrorCode::NetworkError));
    }

    #[tokio::test]
    async fn undecodable_body_is_unknown_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/user"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let result = api().validate_credential(&server.uri(), "t").await;
        assert_eq!(result.error_code, Some(ValidationErrorCode::UnknownError));
    }

    #[test]
    fn error_codes_serialize_snake_case() {
        assert_eq!(
            serde_json::to_value(ValidationErrorCode::InsufficientPermissions).unwrap(),
            json!("insufficient_permissions")
        );
    }
}
