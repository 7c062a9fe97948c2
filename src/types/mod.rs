//! Type definitions for the NeuroGuard service

pub mod alert;
pub mod prediction;

pub use alert::{AlertMessage, AlertReceipt, DeliveryStatus, EmergencyEvent, EmergencyRequest};
pub use prediction::{DisplayRow, PredictionOutcome, Verdict};
