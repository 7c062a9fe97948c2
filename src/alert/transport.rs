//! Mail transports for emergency alerts

use crate::config::{AlertConfig, TransportKind};
use crate::types::alert::{AlertMessage, DeliveryStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hands a formatted alert to whatever delivers email
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Transport name for logs and readiness output
    fn name(&self) -> &str;

    /// Send one message. Errors are reported, never retried.
    async fn send(&self, message: &AlertMessage) -> Result<DeliveryStatus>;
}

/// Transactional email API speaking the Resend wire format
pub struct ResendTransport {
    http: HttpClient,
    api_url: String,
    api_key: Option<String>,
    sender: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

impl ResendTransport {
    pub fn new(api_url: &str, api_key: Option<String>, sender: &str, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed building email HTTP client")?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
            api_key,
            sender: sender.to_string(),
        })
    }
}

#[async_trait]
impl MailTransport for ResendTransport {
    fn name(&self) -> &str {
        "resend"
    }

    async fn send(&self, message: &AlertMessage) -> Result<DeliveryStatus> {
        let Some(api_key) = self.api_key.as_deref() else {
            anyhow::bail!("email API key is not configured");
        };

        let body = json!({
            "from": self.sender,
            "to": [message.recipient],
            "subject": message.subject,
            "html": message.html,
            "text": message.text,
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("failed sending email request")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("email API returned {}: {}", status, detail.trim());
        }

        let payload: SendResponse = response
            .json()
            .await
            .context("failed decoding email API response")?;

        debug!(
            alert_id = %message.alert_id,
            provider_id = %payload.id,
            "Email accepted by provider"
        );
        Ok(DeliveryStatus::Delivered { id: payload.id })
    }
}

/// Writes alerts to the log instead of sending them
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &AlertMessage) -> Result<DeliveryStatus> {
        info!(
            alert_id = %message.alert_id,
            recipient = %message.recipient,
            subject = %message.subject,
            body = %message.text,
            "Emergency alert (log transport, not emailed)"
        );
        Ok(DeliveryStatus::Logged)
    }
}

/// Build the configured transport
pub fn build_transport(config: &AlertConfig) -> Result<Arc<dyn MailTransport>> {
    match config.transport {
        TransportKind::Log => {
            warn!("Alert transport is 'log': emergency emails will not be sent");
            Ok(Arc::new(LogTransport))
        }
        TransportKind::Resend => {
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|key| !key.trim().is_empty());
            if api_key.is_none() {
                warn!(
                    env = %config.api_key_env,
                    "Email API key not set: emergency alerts will fail to deliver"
                );
            }
            let transport = ResendTransport::new(
                &config.api_url,
                api_key,
                &config.sender,
                Duration::from_millis(config.timeout_ms),
            )?;
            Ok(Arc::new(transport))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> AlertMessage {
        AlertMessage {
            alert_id: "a-1".to_string(),
            recipient: "d@x.com".to_string(),
            subject: "subject".to_string(),
            html: "<p>body</p>".to_string(),
            text: "body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_log_transport_reports_logged() {
        let status = LogTransport.send(&message()).await.unwrap();
        assert_eq!(status, DeliveryStatus::Logged);
    }

    #[tokio::test]
    async fn test_resend_without_key_fails_before_network() {
        let transport = ResendTransport::new(
            "http://127.0.0.1:9/emails",
            None,
            "alerts@example.com",
            Duration::from_millis(100),
        )
        .unwrap();
        let err = transport.send(&message()).await.unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[tokio::test]
    async fn test_resend_unreachable_endpoint_errors() {
        let transport = ResendTransport::new(
            "http://127.0.0.1:9/emails",
            Some("key".to_string()),
            "alerts@example.com",
            Duration::from_millis(500),
        )
        .unwrap();
        assert!(transport.send(&message()).await.is_err());
    }

    #[test]
    fn test_build_log_transport() {
        let config = AlertConfig {
            transport: TransportKind::Log,
            ..AlertConfig::default()
        };
        assert_eq!(build_transport(&config).unwrap().name(), "log");
    }
}
