use std::time::Duration;

use reqwest::header::CONTENT_TYPE;

use nudge_common::types::PaymentAck;

/// Default per-call timeout for reminder POSTs.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Raw endpoint answer.
#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RemoteResponse {
    /// Decode the paid flag; malformed bodies read as unpaid.
    pub fn ack(&self) -> PaymentAck {
        PaymentAck::from_body(&self.body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client for the reminder endpoint.
#[derive(Debug, Clone)]
pub struct ReminderClient {
    http: reqwest::Client,
}

impl ReminderClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// POST `payload` as JSON to `uri`.
    ///
    /// Any HTTP status counts as an answer; only transport failures and
    /// timeouts are errors. A body that cannot be read is treated as empty.
    pub async fn post(&self, uri: &str, payload: &str) -> reqwest::Result<RemoteResponse> {
        let response = self
            .http
            .post(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_owned())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                tracing::warn!(uri, status, error = %e, "Failed to read response body");
                Vec::new()
            }
        };

        Ok(RemoteResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_sends_payload_as_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .match_header("content-type", "application/json")
            .match_body(r#"{"email":"a@example.com"}"#)
            .with_status(200)
            .with_body(r#"{"paid":true}"#)
            .create_async()
            .await;

        let client = ReminderClient::new(DEFAULT_TIMEOUT).unwrap();
        let response = client
            .post(
                &format!("{}/messages", server.url()),
                r#"{"email":"a@example.com"}"#,
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.is_success());
        assert!(response.ack().paid);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_still_an_answer() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/messages")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let client = ReminderClient::new(DEFAULT_TIMEOUT).unwrap();
        let response = client
            .post(&format!("{}/messages", server.url()), "{}")
            .await
            .unwrap();

        assert_eq!(response.status, 500);
        assert!(!response.is_success());
        assert!(!response.ack().paid);
        assert_eq!(response.body_text(), "internal error");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let client = ReminderClient::new(DEFAULT_TIMEOUT).unwrap();
        let result = client.post("http://127.0.0.1:1/messages", "{}").await;
        assert!(result.is_err());
    }
}
