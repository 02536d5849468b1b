//! HTTP utilities for the remote embedding service

use std::time::Duration;

use reqwest::{Client, Response};

use crate::error::ExtractionError;

/// Create a reqwest client with connection pooling and the given request timeout
pub fn create_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .build()
}

/// Pull a readable message out of an error body.
///
/// Understands `{"error": {"message": ..}}`, `{"message": ..}` and
/// `{"detail": ..}`; anything else is returned as-is.
pub fn error_detail(body: String) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) else {
        return body;
    };
    json.get("error")
        .and_then(|e| e.get("message").and_then(|m| m.as_str()))
        .or_else(|| json.get("message").and_then(|m| m.as_str()))
        .or_else(|| json.get("detail").and_then(|d| d.as_str()))
        .map(|s| s.to_string())
        .unwrap_or(body)
}

/// Check HTTP response status and return detailed error if not successful
pub async fn check_response(response: Response, service_name: &str) -> Result<Response, ExtractionError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    Err(ExtractionError::Service(format!(
        "{} returned {}: {}",
        service_name,
        status,
        error_detail(body)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client() {
        assert!(create_client(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(
            error_detail(r#"{"error":{"message":"bad image"}}"#.to_string()),
            "bad image"
        );
        assert_eq!(error_detail(r#"{"detail":"too large"}"#.to_string()), "too large");
        assert_eq!(error_detail("plain failure".to_string()), "plain failure");
        assert_eq!(error_detail(r#"{"other":1}"#.to_string()), r#"{"other":1}"#);
    }
}
