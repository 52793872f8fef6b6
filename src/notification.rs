//! Discord webhook notifications
//!
//! Fire-and-forget: the pipeline spawns one task per match, the request is
//! bounded by the client timeout, and the response is discarded. A failed
//! delivery is worth a debug line at most.

use log::debug;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Notifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(webhook_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            webhook_url,
            client,
        }
    }

    /// Posts a single spotted-domain message. Failures are swallowed.
    pub async fn notify(&self, domain: &str) {
        if domain.is_empty() {
            return;
        }
        let payload = serde_json::json!({
            "content": format!("🎯 **Heimdall** spotted: `{}`", domain),
        });
        match self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e) => debug!("webhook delivery failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_contains_the_spotted_domain() {
        let payload = serde_json::json!({
            "content": format!("🎯 **Heimdall** spotted: `{}`", "a.example.com"),
        });
        let body = serde_json::to_string(&payload).unwrap();
        assert!(body.contains("Heimdall"));
        assert!(body.contains("`a.example.com`"));
    }

    #[tokio::test]
    async fn posts_json_to_the_webhook() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"content":"🎯 **Heimdall** spotted: `spotted.example.com`"}"#.to_string(),
            ))
            .with_status(204)
            .create_async()
            .await;

        let notifier = Notifier::new(server.url());
        notifier.notify("spotted.example.com").await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        // Nothing is listening on this port; notify must still return.
        let notifier = Notifier::new("http://127.0.0.1:9".to_string());
        notifier.notify("a.example.com").await;
    }

    #[tokio::test]
    async fn empty_domain_is_not_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/").expect(0).create_async().await;
        let notifier = Notifier::new(server.url());
        notifier.notify("").await;
        mock.assert_async().await;
    }
}
