//! Emergency alert data structures

use serde::Deserialize;
use serde_json::Value;

/// Body of `POST /emergency`.
///
/// Every field is optional at the wire level so that missing fields can be
/// reported together instead of failing on the first one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmergencyRequest {
    /// Any JSON value; non-strings are rendered as their JSON text
    #[serde(default)]
    pub user: Option<Value>,
    /// Number or string, echoed verbatim into the map link
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lon: Option<Value>,
    #[serde(default)]
    pub doctor_email: Option<String>,
}

/// Validated emergency, alive for a single dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyEvent {
    pub user: String,
    pub lat: String,
    pub lon: String,
    pub recipient: String,
}

/// Message handed to the mail transport
#[derive(Debug, Clone)]
pub struct AlertMessage {
    /// Unique alert identifier, for correlating logs with provider records
    pub alert_id: String,
    pub recipient: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Outcome of one send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Accepted by the provider
    Delivered { id: String },
    /// Written to the log only (log transport)
    Logged,
    /// Transport error or timeout
    Failed { reason: String },
}

impl DeliveryStatus {
    /// Whether an email was accepted by the provider. The log transport
    /// does not count.
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Delivered { .. } => "delivered",
            DeliveryStatus::Logged => "logged",
            DeliveryStatus::Failed { .. } => "failed",
        }
    }
}

/// What the dispatcher reports back for one emergency
#[derive(Debug, Clone)]
pub struct AlertReceipt {
    pub alert_id: String,
    pub maps_link: String,
    pub delivery: DeliveryStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_fields_are_optional() {
        let req: EmergencyRequest = serde_json::from_str("{}").unwrap();
        assert!(req.user.is_none());
        assert!(req.lat.is_none());

        let req: EmergencyRequest =
            serde_json::from_str(r#"{"lat": 12.9, "lon": "77.6", "doctor_email": null}"#).unwrap();
        assert_eq!(req.lat, Some(serde_json::json!(12.9)));
        assert_eq!(req.lon, Some(serde_json::json!("77.6")));
        assert!(req.doctor_email.is_none());
    }

    #[test]
    fn test_delivery_status() {
        assert!(DeliveryStatus::Delivered { id: "x".into() }.is_delivered());
        assert!(!DeliveryStatus::Logged.is_delivered());
        let failed = DeliveryStatus::Failed {
            reason: "timeout".into(),
        };
        assert!(!failed.is_delivered());
        assert_eq!(DeliveryStatus::Logged.as_str(), "logged");
        assert_eq!(failed.as_str(), "failed");
    }
}
