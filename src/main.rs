//! Sleep Disorder Classifier - Main Entry Point
//!
//! Loads the model artifacts, then answers assessment submissions received
//! over NATS one at a time.

use anyhow::Result;
use futures::StreamExt;
use sleep_disorder_classifier::{
    config::{AppConfig, LoggingConfig},
    consumer::SubmissionConsumer,
    form::FormSpec,
    metrics::{MetricsReporter, ServiceMetrics},
    models::{ArtifactLoader, OnnxBackend},
    producer::ResponsePublisher,
    service::AssessmentService,
};
use std::sync::Arc;
use tracing::{error, info, warn};

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        format!("sleep_disorder_classifier={}", logging.level).parse()?,
    );

    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Sleep Disorder Classifier");

    // Artifacts must load before any submission is accepted
    let backend = OnnxBackend::new(config.artifacts.onnx_threads, config.inference.sentinel())?;
    let artifact = ArtifactLoader::new(backend)
        .load(&config.artifacts.model_path, &config.artifacts.schema_path)?;
    info!(
        columns = artifact.schema.len(),
        classifier = %artifact.classifier.name(),
        class_labels = ?artifact.classifier.class_labels(),
        "Model artifacts ready"
    );

    let metrics = Arc::new(ServiceMetrics::new());
    let mut service = AssessmentService::new(Arc::new(artifact), metrics.clone());
    if config.form.enforce {
        service = service.with_form(FormSpec::sleep_assessment());
    } else {
        warn!("Form checks disabled; submissions go straight to reconciliation");
    }

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = SubmissionConsumer::new(client.clone(), &config.nats.request_subject);
    let publisher = ResponsePublisher::new(client.clone(), &config.nats.response_subject);

    // Start metrics reporter
    let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;
    info!(
        request_subject = %consumer.subject(),
        response_subject = %publisher.fallback_subject(),
        "Waiting for submissions"
    );

    // Each submission runs to completion before the next is taken
    while let Some(message) = subscription.next().await {
        let response = service.handle_payload(&message.payload);

        if let Err(e) = publisher.publish(&response, message.reply).await {
            error!(
                submission_id = %response.submission_id,
                error = %e,
                "Failed to publish assessment response"
            );
        }
    }

    info!("Classifier shutting down...");
    metrics.print_summary();

    Ok(())
}
