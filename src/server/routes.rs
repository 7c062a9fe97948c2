//! API route handlers

use super::error::ApiError;
use super::AppState;
use crate::error::Error;
use crate::metrics::MetricsSnapshot;
use crate::types::alert::EmergencyRequest;
use crate::types::prediction::{DisplayRow, PredictionOutcome, Verdict};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, warn};

/// Status string returned by `/emergency`, whatever the delivery outcome
pub const ALERT_ACK: &str = "Emergency alert sent";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub prediction: Verdict,
    pub csv_data: Vec<DisplayRow>,
}

#[derive(Debug, Serialize)]
pub struct EmergencyResponse {
    pub status: &'static str,
    pub maps_link: String,
    /// True only when the email provider accepted the message
    pub delivered: bool,
    /// `delivered`, `logged` or `failed`
    pub delivery: &'static str,
}

/// `POST /upload`: multipart field `file` holding the CSV
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let started = Instant::now();
    info!("File upload received");

    match score_upload(&state, multipart).await {
        Ok(outcome) => {
            state
                .metrics
                .record_upload(started.elapsed(), outcome.total_rows, outcome.verdict);
            Ok(Json(UploadResponse {
                prediction: outcome.verdict,
                csv_data: outcome.display_rows,
            }))
        }
        Err(err) => {
            match &err {
                Error::Validation(message) => {
                    state.metrics.record_rejection();
                    warn!(reason = %message, "Upload rejected");
                }
                Error::Internal(cause) | Error::Startup(cause) => {
                    state.metrics.record_internal_failure();
                    error!(error = %format!("{:#}", cause), "Processing error");
                }
            }
            Err(err.into())
        }
    }
}

async fn score_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<PredictionOutcome, Error> {
    let mut multipart =
        multipart.map_err(|e| Error::validation(format!("Invalid multipart request: {}", e)))?;
    let csv_bytes = read_file_field(&mut multipart).await?;

    // scaling and ONNX inference are CPU-bound
    let inference = state.inference.clone();
    tokio::task::spawn_blocking(move || inference.predict(&csv_bytes))
        .await
        .map_err(|e| Error::internal(anyhow::anyhow!("prediction task failed: {}", e)))?
}

/// Contents of the `file` field
async fn read_file_field(multipart: &mut Multipart) -> Result<Bytes, Error> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("Invalid multipart request: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        // a browser form with nothing chosen sends an empty filename
        let file_name = match field.file_name() {
            None | Some("") => return Err(Error::validation("No selected file")),
            Some(name) => name.to_string(),
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::validation(format!("Failed to read upload: {}", e)))?;
        info!(file = %file_name, bytes = data.len(), "Received file");
        return Ok(data);
    }

    Err(Error::validation("No file provided"))
}

/// `POST /emergency`: JSON `{user?, lat, lon, doctor_email}`
pub async fn emergency(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<EmergencyResponse>, ApiError> {
    let request = parse_emergency(&body).map_err(|e| {
        warn!(reason = %e, "Emergency request body rejected");
        ApiError::from(e)
    })?;

    let receipt = state.alerts.send_alert(request).await.map_err(|e| {
        warn!(reason = %e, "Emergency request rejected");
        ApiError::from(e)
    })?;
    state.metrics.record_alert(&receipt.delivery);

    Ok(Json(EmergencyResponse {
        status: ALERT_ACK,
        maps_link: receipt.maps_link,
        delivered: receipt.delivery.is_delivered(),
        delivery: receipt.delivery.as_str(),
    }))
}

/// Body must be a JSON object; serde would otherwise read an array by position
fn parse_emergency(body: &[u8]) -> Result<EmergencyRequest, Error> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| Error::validation(format!("Invalid JSON body: {}", e)))?;
    if !value.is_object() {
        return Err(Error::validation("Invalid JSON body: expected a JSON object"));
    }
    serde_json::from_value(value).map_err(|e| Error::validation(format!("Invalid JSON body: {}", e)))
}

/// Liveness probe - is the server running?
pub async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe - artifacts are loaded before the server binds, so a
/// running server is always ready; this reports what it is serving with
pub async fn readiness(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION"),
        "classifier": state.inference.classifier_name(),
        "expected_features": state.inference.expected_features(),
        "display_columns": state.inference.display_columns(),
        "mail_transport": state.alerts.transport_name(),
    }))
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::dispatcher::tests::RecordingTransport;
    use crate::alert::{AlertDispatcher, MailTransport};
    use crate::config::{AlertConfig, ServerConfig};
    use crate::metrics::ServiceMetrics;
    use crate::models::inference::tests::{service_with, BrokenClassifier, CutoffClassifier};
    use crate::models::Classifier;
    use crate::server::error::INTERNAL_ERROR_MESSAGE;
    use crate::server::router;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "neuroguard-test-boundary";
    const HEADER: &str = "heart_rate,temperature,spo2,vibration_intensity";

    struct Harness {
        app: Router,
        transport: Arc<RecordingTransport>,
        metrics: Arc<ServiceMetrics>,
        _static_dir: tempfile::TempDir,
    }

    fn harness_with(classifier: Arc<dyn Classifier>, transport: RecordingTransport) -> Harness {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<h1>NeuroGuard</h1>").unwrap();
        std::fs::write(static_dir.path().join("results.html"), "<h1>Results</h1>").unwrap();

        let transport = Arc::new(transport);
        let metrics = Arc::new(ServiceMetrics::new());

        let alert_config = AlertConfig {
            timeout_ms: 100,
            ..AlertConfig::default()
        };
        let state = AppState {
            inference: Arc::new(service_with(classifier)),
            alerts: Arc::new(AlertDispatcher::new(
                transport.clone() as Arc<dyn MailTransport>,
                &alert_config,
            )),
            metrics: metrics.clone(),
        };
        let server_config = ServerConfig {
            static_dir: static_dir.path().to_path_buf(),
            ..ServerConfig::default()
        };

        Harness {
            app: router(state, &server_config),
            transport,
            metrics,
            _static_dir: static_dir,
        }
    }

    fn harness() -> Harness {
        harness_with(
            Arc::new(CutoffClassifier::new(0.0)),
            RecordingTransport::default(),
        )
    }

    fn multipart_request(field: &str, filename: Option<&str>, content: &str) -> Request<Body> {
        let disposition = match filename {
            Some(name) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, name),
            None => format!("form-data; name=\"{}\"", field),
        };
        let body = format!(
            "--{b}\r\nContent-Disposition: {d}\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            d = disposition,
            c = content
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn upload_csv(content: &str) -> Request<Body> {
        multipart_request("file", Some("readings.csv"), content)
    }

    fn json_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_upload_reference_row_is_safe() {
        let h = harness();
        let (status, body) = send(&h.app, upload_csv(&format!("{}\n60,36.5,98,0.1", HEADER))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "prediction": "Safe",
                "csv_data": [
                    {"heart_rate": 60, "temperature": 36.5, "spo2": 98, "vibration_intensity": 0.1}
                ]
            })
        );
        assert_eq!(h.metrics.snapshot().verdicts_safe, 1);
    }

    #[tokio::test]
    async fn test_upload_flags_seizure_and_keeps_row_order() {
        let h = harness();
        let csv = format!("{}\n60,36.5,98,0.1\n150,39.1,88,0.95\n72,36.7,97,0.2", HEADER);
        let (status, body) = send(&h.app, upload_csv(&csv)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"], "Seizure Detected");
        let rows = body["csv_data"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["heart_rate"], 60);
        assert_eq!(rows[1]["heart_rate"], 150);
        assert_eq!(rows[2]["heart_rate"], 72);
        assert_eq!(rows[1].as_object().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_upload_wrong_column_count_is_400_without_inference() {
        let classifier = Arc::new(CutoffClassifier::new(0.0));
        let h = harness_with(classifier.clone(), RecordingTransport::default());
        let (status, body) = send(&h.app, upload_csv("heart_rate,temperature,spo2\n60,36.5,98")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Expected 4 features, got 3");
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.metrics.snapshot().uploads_rejected, 1);
    }

    #[tokio::test]
    async fn test_upload_missing_display_column_is_400() {
        let classifier = Arc::new(CutoffClassifier::new(0.0));
        let h = harness_with(classifier.clone(), RecordingTransport::default());
        let csv = "heart_rate,temperature,oxygen,vibration_intensity\n60,36.5,98,0.1";
        let (status, body) = send(&h.app, upload_csv(csv)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required columns: spo2");
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_model_failure_is_500_with_generic_message() {
        let h = harness_with(Arc::new(BrokenClassifier), RecordingTransport::default());
        let csv = format!("{}\n60,36.5,98,0.1\n61,36.6,97,0.1", HEADER);
        let (status, body) = send(&h.app, upload_csv(&csv)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": INTERNAL_ERROR_MESSAGE }));
        let snapshot = h.metrics.snapshot();
        assert_eq!(snapshot.internal_failures, 1);
        assert_eq!(snapshot.uploads_rejected, 0);
        assert_eq!(snapshot.uploads_processed, 0);
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let h = harness();
        let (status, body) = send(&h.app, multipart_request("other", Some("a.csv"), "x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file provided");

        let (status, body) = send(&h.app, multipart_request("file", Some(""), "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No selected file");
    }

    #[tokio::test]
    async fn test_upload_not_multipart() {
        let h = harness();
        let (status, body) = send(&h.app, json_request("/upload", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid multipart request"));
    }

    #[tokio::test]
    async fn test_upload_empty_file_is_unparseable() {
        let h = harness();
        let (status, body) = send(&h.app, upload_csv("")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("unparseable input"));
    }

    #[tokio::test]
    async fn test_emergency_sends_alert() {
        let h = harness();
        let (status, body) = send(
            &h.app,
            json_request(
                "/emergency",
                r#"{"user":"Alice","lat":12.9,"lon":77.6,"doctor_email":"d@x.com"}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Emergency alert sent");
        assert_eq!(body["maps_link"], "https://www.google.com/maps?q=12.9,77.6");
        assert_eq!(body["delivered"], true);

        let sent = h.transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "d@x.com");
    }

    #[tokio::test]
    async fn test_emergency_out_of_range_coordinates_still_link() {
        let h = harness();
        let (status, body) = send(
            &h.app,
            json_request("/emergency", r#"{"lat":999,"lon":-500,"doctor_email":"d@x.com"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["maps_link"], "https://www.google.com/maps?q=999,-500");
        assert_eq!(h.transport.sent.lock().unwrap()[0].subject, "🚨 Seizure Alert for Unknown User");
    }

    #[tokio::test]
    async fn test_emergency_missing_fields_is_400() {
        let h = harness();
        let (status, body) = send(&h.app, json_request("/emergency", r#"{"user":"Alice","lat":1}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields: lon, doctor_email");
        assert!(h.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_emergency_unparseable_body_is_400() {
        let h = harness();
        let (status, body) = send(&h.app, json_request("/emergency", "not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    }

    #[tokio::test]
    async fn test_emergency_array_body_is_400() {
        let h = harness();
        let (status, body) = send(
            &h.app,
            json_request("/emergency", r#"[null, 12.9, 77.6, "d@x.com"]"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON body: expected a JSON object");
        assert!(h.transport.sent.lock().unwrap().is_empty());
        assert_eq!(h.metrics.snapshot().alerts_requested, 0);
    }

    #[tokio::test]
    async fn test_emergency_accepts_non_string_user() {
        let h = harness();
        let (status, _) = send(
            &h.app,
            json_request("/emergency", r#"{"user":42,"lat":1,"lon":2,"doctor_email":"d@x.com"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.transport.sent.lock().unwrap()[0].subject, "🚨 Seizure Alert for 42");
    }

    #[tokio::test]
    async fn test_emergency_log_transport_is_not_delivered() {
        let static_dir = tempfile::tempdir().unwrap();
        let state = AppState {
            inference: Arc::new(service_with(Arc::new(CutoffClassifier::new(0.0)))),
            alerts: Arc::new(AlertDispatcher::new(
                Arc::new(crate::alert::LogTransport),
                &AlertConfig::default(),
            )),
            metrics: Arc::new(ServiceMetrics::new()),
        };
        let server_config = ServerConfig {
            static_dir: static_dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let app = router(state, &server_config);

        let (status, body) = send(
            &app,
            json_request("/emergency", r#"{"lat":1,"lon":2,"doctor_email":"d@x.com"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Emergency alert sent");
        assert_eq!(body["delivered"], false);
        assert_eq!(body["delivery"], "logged");
    }

    #[tokio::test]
    async fn test_emergency_reports_failed_delivery() {
        let h = harness_with(
            Arc::new(CutoffClassifier::new(0.0)),
            RecordingTransport {
                fail: true,
                ..Default::default()
            },
        );
        let (status, body) = send(
            &h.app,
            json_request("/emergency", r#"{"lat":1,"lon":2,"doctor_email":"d@x.com"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Emergency alert sent");
        assert_eq!(body["delivered"], false);
        assert_eq!(h.metrics.snapshot().alerts_failed, 1);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let h = harness();
        let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

        let (status, body) = send(&h.app, get("/health/live")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "alive");

        let (_, body) = send(&h.app, get("/health/ready")).await;
        assert_eq!(body["expected_features"], 4);
        assert_eq!(body["classifier"], "cutoff");
        assert_eq!(body["mail_transport"], "recording");

        let (status, body) = send(&h.app, get("/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["uploads_processed"], 0);
    }

    #[tokio::test]
    async fn test_static_pages_are_served() {
        let h = harness();
        let response = h
            .app
            .clone()
            .oneshot(Request::builder().uri("/results.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"<h1>Results</h1>");
    }

    #[tokio::test]
    async fn test_cors_headers_present() {
        let h = harness();
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }
}
