//! Sample Reading Uploader
//!
//! Generates synthetic wearable sensor readings and uploads them to a running
//! NeuroGuard server as CSV.

use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

const HEADER: &str = "heart_rate,temperature,spo2,vibration_intensity";

/// One sensor sample in column order
#[derive(Debug, Clone, Copy)]
struct Reading {
    heart_rate: u32,
    temperature: f64,
    spo2: u32,
    vibration_intensity: f64,
}

impl Reading {
    fn to_csv_row(self) -> String {
        format!(
            "{},{:.1},{},{:.2}",
            self.heart_rate, self.temperature, self.spo2, self.vibration_intensity
        )
    }
}

/// Reading generator for testing
struct ReadingGenerator {
    rng: rand::rngs::ThreadRng,
}

impl ReadingGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Resting vitals, little movement
    fn generate_normal(&mut self) -> Reading {
        Reading {
            heart_rate: self.rng.gen_range(55..95),
            temperature: self.rng.gen_range(36.1..37.2),
            spo2: self.rng.gen_range(95..100),
            vibration_intensity: self.rng.gen_range(0.0..0.3),
        }
    }

    /// Tachycardia, desaturation and strong rhythmic movement
    fn generate_seizure_like(&mut self) -> Reading {
        Reading {
            heart_rate: self.rng.gen_range(120..180),
            temperature: self.rng.gen_range(37.5..39.5),
            spo2: self.rng.gen_range(82..92),
            vibration_intensity: self.rng.gen_range(0.7..1.0),
        }
    }

    fn generate_csv(&mut self, rows: usize, seizure_rate: f64) -> (String, usize) {
        let mut csv = String::from(HEADER);
        let mut seizure_rows = 0;
        for _ in 0..rows {
            let reading = if self.rng.gen_bool(seizure_rate) {
                seizure_rows += 1;
                self.generate_seizure_like()
            } else {
                self.generate_normal()
            };
            csv.push('\n');
            csv.push_str(&reading.to_csv_row());
        }
        csv.push('\n');
        (csv, seizure_rows)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    prediction: String,
    csv_data: Vec<serde_json::Value>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_uploader=info".parse()?),
        )
        .init();

    info!("Starting Sample Reading Uploader");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let base_url = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("http://localhost:5000");
    let uploads: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5);
    let rows: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(20);
    let seizure_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.05);
    let seizure_rate = seizure_rate.clamp(0.0, 1.0);

    info!(
        base_url = %base_url,
        uploads = uploads,
        rows = rows,
        seizure_rate = seizure_rate,
        "Configuration loaded"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    // Check the server is up before generating anything
    let health_url = format!("{}/health", base_url);
    if let Err(e) = client
        .get(&health_url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
    {
        warn!(error = %e, "Server not reachable. Running in dry-run mode.");
        return run_dry_mode(uploads, rows, seizure_rate);
    }

    let upload_url = format!("{}/upload", base_url);
    let mut generator = ReadingGenerator::new();
    let mut flagged = 0;

    for i in 0..uploads {
        let (csv, seizure_rows) = generator.generate_csv(rows, seizure_rate);
        let part = reqwest::multipart::Part::bytes(csv.into_bytes())
            .file_name(format!("readings_{:04}.csv", i + 1))
            .mime_str("text/csv")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = client.post(&upload_url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(upload = i + 1, status = %status, body = %body, "Upload rejected");
            continue;
        }

        let result: UploadResponse = response.json().await?;
        if result.prediction != "Safe" {
            flagged += 1;
        }
        info!(
            upload = i + 1,
            prediction = %result.prediction,
            rows = result.csv_data.len(),
            seizure_like_rows = seizure_rows,
            "Upload scored"
        );
    }

    info!("Completed! {} uploads, {} flagged", uploads, flagged);

    Ok(())
}

fn run_dry_mode(uploads: u64, rows: usize, seizure_rate: f64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no server connection)");

    let mut generator = ReadingGenerator::new();
    for i in 0..uploads {
        let (csv, seizure_rows) = generator.generate_csv(rows, seizure_rate);
        if i == 0 {
            info!("Sample upload {}:\n{}", i + 1, csv);
        }
        info!(upload = i + 1, seizure_like_rows = seizure_rows, "Generated upload");
    }

    Ok(())
}
