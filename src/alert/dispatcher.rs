//! Alert dispatcher: validates an emergency, builds the message, sends it

use super::transport::MailTransport;
use crate::config::AlertConfig;
use crate::error::{Error, Result};
use crate::types::alert::{
    AlertMessage, AlertReceipt, DeliveryStatus, EmergencyEvent, EmergencyRequest,
};
use chrono::{DateTime, Local};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const MAPS_URL: &str = "https://www.google.com/maps";

/// Map link for a coordinate pair, values embedded verbatim.
///
/// No range check: `lat=999` still yields a well-formed link.
pub fn maps_link(lat: &str, lon: &str) -> String {
    format!("{}?q={},{}", MAPS_URL, lat, lon)
}

/// Formats and sends emergency alerts. Stateless between requests.
pub struct AlertDispatcher {
    transport: Arc<dyn MailTransport>,
    timeout: Duration,
    default_user: String,
}

impl AlertDispatcher {
    pub fn new(transport: Arc<dyn MailTransport>, config: &AlertConfig) -> Self {
        Self {
            transport,
            timeout: Duration::from_millis(config.timeout_ms),
            default_user: config.default_user.clone(),
        }
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Validate a request into an event.
    ///
    /// All absent required fields are reported at once, in
    /// `lat, lon, doctor_email` order.
    pub fn event_from_request(&self, request: EmergencyRequest) -> Result<EmergencyEvent> {
        let lat = coordinate("lat", request.lat)?;
        let lon = coordinate("lon", request.lon)?;
        let recipient = request
            .doctor_email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());

        let missing: Vec<&str> = [
            ("lat", lat.is_none()),
            ("lon", lon.is_none()),
            ("doctor_email", recipient.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| *name)
        .collect();

        match (lat, lon, recipient) {
            (Some(lat), Some(lon), Some(recipient)) => {
                let user = display_user(request.user)
                    .unwrap_or_else(|| self.default_user.clone());
                Ok(EmergencyEvent {
                    user,
                    lat,
                    lon,
                    recipient,
                })
            }
            _ => Err(Error::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }

    /// Validate and dispatch in one step
    pub async fn send_alert(&self, request: EmergencyRequest) -> Result<AlertReceipt> {
        let event = self.event_from_request(request)?;
        Ok(self.dispatch(&event).await)
    }

    /// Send an alert for a validated event.
    ///
    /// Delivery failures and timeouts never fail the call; they come back in
    /// the receipt's delivery status.
    pub async fn dispatch(&self, event: &EmergencyEvent) -> AlertReceipt {
        let link = maps_link(&event.lat, &event.lon);
        let message = build_message(event, &link, Local::now());

        warn!(
            alert_id = %message.alert_id,
            user = %event.user,
            lat = %event.lat,
            lon = %event.lon,
            recipient = %event.recipient,
            "Emergency alert received"
        );

        let delivery = match tokio::time::timeout(self.timeout, self.transport.send(&message)).await {
            Ok(Ok(status)) => {
                info!(
                    alert_id = %message.alert_id,
                    recipient = %event.recipient,
                    transport = self.transport.name(),
                    "Emergency alert dispatched"
                );
                status
            }
            Ok(Err(e)) => {
                error!(
                    alert_id = %message.alert_id,
                    recipient = %event.recipient,
                    error = %format!("{:#}", e),
                    "Failed to send emergency alert"
                );
                DeliveryStatus::Failed {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                error!(
                    alert_id = %message.alert_id,
                    recipient = %event.recipient,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Emergency alert send timed out"
                );
                DeliveryStatus::Failed {
                    reason: format!("timed out after {}ms", self.timeout.as_millis()),
                }
            }
        };

        AlertReceipt {
            alert_id: message.alert_id,
            maps_link: link,
            delivery,
        }
    }
}

/// Number or non-empty string; null, absent and empty mean "missing"
fn coordinate(field: &str, value: Option<Value>) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(_) => Err(Error::validation(format!(
            "Field '{}' must be a number or a string",
            field
        ))),
    }
}

/// Name for the message. Strings are trimmed, other JSON values use their
/// JSON text. Null and blank mean "not given".
fn display_user(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        other => Some(other.to_string()),
    }
}

/// Subject, HTML and text bodies for an emergency
pub fn build_message(event: &EmergencyEvent, link: &str, at: DateTime<Local>) -> AlertMessage {
    let timestamp = at.format("%Y-%m-%d %H:%M:%S").to_string();
    let user_html = escape_html(&event.user);
    let link_html = escape_html(link);

    let html = format!(
        "<h2>🚨 Emergency Alert</h2>\n\
         <p><strong>{user}</strong> may be experiencing a seizure.</p>\n\
         <p>Time: {timestamp}</p>\n\
         <p>📍 <a href=\"{link}\">View Live Location on Google Maps</a></p>\n\
         <p>NeuroGuard<br/>Seizure Detection System</p>",
        user = user_html,
        timestamp = timestamp,
        link = link_html,
    );
    let text = format!(
        "{user} may be experiencing a seizure.\n\nTime: {timestamp}\nLive location: {link}\n\n-- NeuroGuard Seizure Detection System",
        user = event.user,
        timestamp = timestamp,
        link = link,
    );

    AlertMessage {
        alert_id: uuid::Uuid::new_v4().to_string(),
        recipient: event.recipient.clone(),
        subject: format!("🚨 Seizure Alert for {}", event.user),
        html,
        text,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
