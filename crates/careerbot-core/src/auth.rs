use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Serialize)]
struct RegisterRequest<'a> {
    login: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    login: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Broad reason an auth request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// 400
    InvalidFields,
    /// 401, or the server's "Invalid credentials" detail
    InvalidCredentials,
    /// 422
    ValidationFailed,
    /// 5xx
    Server,
    /// The server could not be reached
    NoConnection,
    /// The server's "User already exists" detail
    UserExists,
    /// A detail string the client does not know, shown verbatim
    Rejected,
    /// Any other status, or a success response without a token
    Unexpected,
}

/// A user-facing auth failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn no_connection() -> Self {
        Self::new(AuthErrorKind::NoConnection, "no connection")
    }

    fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status.as_u16());
        self
    }

    /// Builds the error for a non-success response from its status and body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        if let Some(detail) = detail_string(body) {
            let error = match detail.as_str() {
                "User already exists" => AuthError::new(
                    AuthErrorKind::UserExists,
                    "A user with this login already exists",
                ),
                "Invalid credentials" => {
                    AuthError::new(AuthErrorKind::InvalidCredentials, "Wrong login or password")
                }
                _ => AuthError::new(AuthErrorKind::Rejected, detail),
            };
            return error.with_status(status);
        }

        let error = match status.as_u16() {
            400 => AuthError::new(AuthErrorKind::InvalidFields, "invalid fields"),
            401 => AuthError::new(AuthErrorKind::InvalidCredentials, "invalid credentials"),
            422 => AuthError::new(AuthErrorKind::ValidationFailed, "validation failed"),
            s if s >= 500 => AuthError::new(AuthErrorKind::Server, "server error"),
            s => AuthError::new(
                AuthErrorKind::Unexpected,
                format!("request failed (status {})", s),
            ),
        };
        error.with_status(status)
    }
}

/// Extracts `{"detail": "<string>"}` from an error body. List-shaped details
/// (422 field errors) are not strings and fall through to the status table.
fn detail_string(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

fn transport_error(e: reqwest::Error) -> AuthError {
    warn!(error = %e, "auth request did not complete");
    if e.is_decode() {
        AuthError::new(AuthErrorKind::Unexpected, "unexpected server response")
    } else {
        AuthError::no_connection()
    }
}

/// Client for the register and login endpoints
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn register(&self, login: &str, email: &str, password: &str) -> Result<String, AuthError> {
        let request = RegisterRequest {
            login,
            email,
            password,
        };
        let token = self.post_for_token("/api/v1/auth/register", &request).await?;
        info!(login, "registered");
        Ok(token)
    }

    pub async fn login(&self, login: &str, password: &str) -> Result<String, AuthError> {
        let request = LoginRequest { login, password };
        let token = self.post_for_token("/api/v1/auth/login", &request).await?;
        info!(login, "logged in");
        Ok(token)
    }

    async fn post_for_token<T: Serialize>(&self, path: &str, body: &T) -> Result<String, AuthError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = AuthError::from_response(status, &text);
            warn!(status = status.as_u16(), kind = ?error.kind, "auth request rejected");
            return Err(error);
        }

        let token: TokenResponse = response.json().await.map_err(transport_error)?;
        if token.access_token.is_empty() {
            return Err(AuthError::new(
                AuthErrorKind::Unexpected,
                "unexpected server response",
            ));
        }
        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        let cases = [
            (400, AuthErrorKind::InvalidFields, "invalid fields"),
            (401, AuthErrorKind::InvalidCredentials, "invalid credentials"),
            (422, AuthErrorKind::ValidationFailed, "validation failed"),
            (500, AuthErrorKind::Server, "server error"),
            (503, AuthErrorKind::Server, "server error"),
            (404, AuthErrorKind::Unexpected, "request failed (status 404)"),
        ];
        for (status, kind, message) in cases {
            let err = AuthError::from_response(StatusCode::from_u16(status).unwrap(), "");
            assert_eq!(err.kind, kind);
            assert_eq!(err.message, message);
            assert_eq!(err.status, Some(status));
        }
    }

    #[test]
    fn test_known_details() {
        let err = AuthError::from_response(
            StatusCode::BAD_REQUEST,
            r#"{"detail":"User already exists"}"#,
        );
        assert_eq!(err.kind, AuthErrorKind::UserExists);
        assert_eq!(err.to_string(), "A user with this login already exists");

        let err = AuthError::from_response(
            StatusCode::UNAUTHORIZED,
            r#"{"detail":"Invalid credentials"}"#,
        );
        assert_eq!(err.kind, AuthErrorKind::InvalidCredentials);
        assert_eq!(err.to_string(), "Wrong login or password");
    }

    #[test]
    fn test_unknown_detail_passes_through() {
        let err = AuthError::from_response(
            StatusCode::FORBIDDEN,
            r#"{"detail":"Account locked"}"#,
        );
        assert_eq!(err.kind, AuthErrorKind::Rejected);
        assert_eq!(err.message, "Account locked");
    }

    #[test]
    fn test_list_detail_uses_status() {
        let err = AuthError::from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"loc":["body","email"],"msg":"field required"}]}"#,
        );
        assert_eq!(err.kind, AuthErrorKind::ValidationFailed);
    }

    #[test]
    fn test_plain_text_body_uses_status() {
        let err = AuthError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        assert_eq!(err.message, "server error");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = AuthClient::new("http://localhost:8000/");
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
