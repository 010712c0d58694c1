//! Test Assessment Submitter
//!
//! Generates sleep assessments and sends them to the classifier over NATS,
//! logging each response.

use rand::Rng;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{info, warn};

const OCCUPATIONS: [&str; 6] = [
    "Doctor",
    "Engineer",
    "Sales Representative",
    "Nurse",
    "Teacher",
    "Software Engineer",
];

const BMI_CATEGORIES: [&str; 4] = ["Normal", "Overweight", "Obese", "Underweight"];

/// Assessment generator for testing
struct AssessmentGenerator {
    rng: rand::rngs::ThreadRng,
}

impl AssessmentGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Generate a complete assessment within the form's ranges
    fn generate(&mut self) -> Map<String, Value> {
        let fields = json!({
            "Age": self.rng.gen_range(18..=100),
            "Gender": self.random_choice(&["Male", "Female"]),
            "Occupation": self.random_choice(&OCCUPATIONS),
            "Sleep Duration": (self.rng.gen_range(3.0..=12.0_f64) * 10.0).round() / 10.0,
            "Stress Level": self.rng.gen_range(1..=10),
            "Physical Activity Level": self.rng.gen_range(0..=100),
            "Heart Rate": self.rng.gen_range(40..=120),
            "Daily Steps": self.rng.gen_range(1000..=20000),
            "BMI Category": self.random_choice(&BMI_CATEGORIES),
        });

        match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Generate an assessment with a dropped field and an unknown one
    fn generate_partial(&mut self) -> Map<String, Value> {
        let mut fields = self.generate();
        let keys: Vec<String> = fields.keys().cloned().collect();
        let dropped = &keys[self.rng.gen_range(0..keys.len())];
        fields.remove(dropped);
        fields.insert(
            "Quality of Sleep".to_string(),
            json!(self.rng.gen_range(4..=9)),
        );
        fields
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_submitter=info".parse()?),
        )
        .init();

    info!("Starting Test Assessment Submitter");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("sleep.assessments");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(20);
    let partial_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.2);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(250);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        partial_rate = partial_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, partial_rate, delay_ms).await;
        }
    };

    let mut generator = AssessmentGenerator::new();
    let mut rng = rand::thread_rng();
    let mut answered = 0;

    for i in 0..count {
        let assessment = if rng.gen_bool(partial_rate) {
            generator.generate_partial()
        } else {
            generator.generate()
        };

        let payload = serde_json::to_vec(&assessment)?;

        match client.request(subject.to_string(), payload.into()).await {
            Ok(reply) => {
                answered += 1;
                let response: Value = serde_json::from_slice(&reply.payload)?;
                info!(
                    request = i + 1,
                    prediction = %response["prediction"]["label"],
                    missing = %response["diagnostics"]["missing"],
                    extra = %response["diagnostics"]["extra"],
                    error = %response["error"],
                    "Received response"
                );
            }
            Err(e) => warn!(request = i + 1, error = %e, "Request failed"),
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! {}/{} submissions answered", answered, count);

    Ok(())
}

async fn run_dry_mode(count: u64, partial_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = AssessmentGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let assessment = if rng.gen_bool(partial_rate) {
            generator.generate_partial()
        } else {
            generator.generate()
        };

        let json = serde_json::to_string_pretty(&assessment)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample assessment {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
