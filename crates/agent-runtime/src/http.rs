//! Shared HTTP plumbing for the vendor adapters

use std::time::Duration;

use agent_core::{AgentError, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))
}

/// Send a JSON request and return the decoded body of a successful response
pub(crate) async fn send_json(vendor: &str, request: RequestBuilder) -> Result<Value> {
    let response = request.send().await.map_err(|e| transport_error(vendor, &e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(vendor, &e))?;

    if !status.is_success() {
        tracing::warn!(vendor, status = status.as_u16(), "Provider returned an error status");
        return Err(status_error(status, &body));
    }

    serde_json::from_str(&body)
        .map_err(|e| AgentError::InvalidResponse(format!("{vendor} returned non-JSON body: {e}")))
}

fn transport_error(vendor: &str, e: &reqwest::Error) -> AgentError {
    if e.is_timeout() {
        AgentError::ProviderUnavailable(format!("{vendor} request timed out: {e}"))
    } else if e.is_connect() {
        AgentError::ProviderUnavailable(format!("cannot reach {vendor}: {e}"))
    } else {
        AgentError::ProviderUnavailable(format!("{vendor} request failed: {e}"))
    }
}

/// Map an error status to the error taxonomy, keeping the vendor's own message
pub(crate) fn status_error(status: StatusCode, body: &str) -> AgentError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(message),
        _ => AgentError::Provider {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, body),
            AgentError::Auth(m) if m == "Incorrect API key provided"
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            AgentError::RateLimited(_)
        ));

        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, "overloaded");
        assert!(matches!(err, AgentError::Provider { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        let client = build_client(2).unwrap();
        let err = send_json("openai", client.post("http://127.0.0.1:1/v1/chat/completions"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_timeout_keeps_transport_detail() {
        // Accepts connections into the backlog but never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());

        let client = build_client(30).unwrap();
        let err = send_json("openai", client.post(url).timeout(Duration::from_millis(200)))
            .await
            .unwrap_err();
        match err {
            AgentError::ProviderUnavailable(message) => {
                assert!(message.starts_with("openai request timed out: "), "{message}");
                assert!(message.len() > "openai request timed out: ".len());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
