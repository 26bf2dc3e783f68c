use log::{info, warn};
use reqwest::Client;
use serde::Serialize;
use url::Url;

use crate::error::{Result, StageWatchError};

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts plain-text reports to a chat webhook.
///
/// Delivery is best-effort: a single attempt, failures are logged and never
/// propagated.
pub struct WebhookNotifier {
    client: Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| StageWatchError::Config(format!("Invalid webhook URL: {e}")))?;
        let client = Client::builder()
            .user_agent(concat!("stagewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StageWatchError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, url })
    }

    /// Sends `text`; returns whether the webhook accepted it.
    pub async fn send(&self, text: &str) -> bool {
        let result = self
            .client
            .post(self.url.clone())
            .json(&WebhookPayload { text })
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!("Report delivered to webhook");
                true
            }
            Ok(response) => {
                // Log the host only, the path carries the secret
                warn!(
                    "Webhook at {} rejected report with status {}",
                    self.url.host_str().unwrap_or("unknown host"),
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!(
                    "Failed to deliver report to webhook at {}: {e}",
                    self.url.host_str().unwrap_or("unknown host")
                );
                false
            }
        }
    }
}
