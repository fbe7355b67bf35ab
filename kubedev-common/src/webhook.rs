use serde::Serialize;

/// Posts lifecycle notifications to an external chat webhook (Slack-shaped:
/// `{"text": "..."}`). Skips silently if unconfigured; failures are logged
/// and never propagate (§6.3, §4.6).
#[derive(Clone)]
pub struct NotificationHook {
    client: reqwest::Client,
    url: Option<String>,
}

#[derive(Serialize)]
struct Payload<'a> {
    text: &'a str,
}

impl NotificationHook {
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub async fn notify(&self, message: &str) {
        let Some(url) = self.url.as_deref() else {
            tracing::warn!("notification webhook is not configured, skipping notification");
            return;
        };

        let response = self.client.post(url).json(&Payload { text: message }).send().await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(message, "sent notification");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(%status, body, "notification webhook returned an error status");
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to reach notification webhook");
            }
        }
    }
}
