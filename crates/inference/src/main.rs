use anyhow::Context;
use common::{TelemetryConfig, TelemetryGuard};
use inference::backend::ort::OrtBackend;
use inference::logging::{SERVICE_NAME, setup_logging};
use inference::processing::detection;
use inference::{DetectionParams, Driver, InferenceConfig, Threaded};
use preprocess::BgrImage;
use std::collections::HashMap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = InferenceConfig::from_env()?;

    let _telemetry = config
        .otel_endpoint
        .as_ref()
        .map(|endpoint| TelemetryGuard::init(&TelemetryConfig::from_env(SERVICE_NAME, endpoint)))
        .transpose()?;

    setup_logging(&config)?;

    tracing::info!(config = ?config, "Loaded configuration");

    let backend = Threaded::<OrtBackend>::load_model(&config.model_path, config.model_threads)?;
    let driver = Driver::new(backend, config.normalize_input);

    let image_path = config
        .image_path
        .as_deref()
        .context("IMAGE_PATH must point to an image to run")?;
    let image = load_bgr(image_path)?;
    tracing::info!(path = image_path, width = image.width(), height = image.height(), "Image loaded");

    let input_name = driver
        .io_signature()
        .inputs
        .first()
        .map(|info| info.name.clone())
        .context("Model declares no inputs")?;
    let output_name = driver
        .io_signature()
        .outputs
        .first()
        .map(|info| info.name.clone())
        .context("Model declares no outputs")?;

    driver.exec_images(HashMap::from([(input_name.clone(), vec![image])]), Some(config.input_size))?;
    driver.wait_until_idle(config.run_timeout, config.poll_interval)?;

    let completion = driver
        .completions()
        .recv_timeout(config.run_timeout)
        .context("Run finished without posting a completion")?;
    if let Err(e) = &completion.outputs {
        anyhow::bail!("Inference failed: {}", e);
    }
    tracing::info!(elapsed = ?completion.elapsed, "Run completed");

    let predictions = completion
        .output(&output_name)
        .with_context(|| format!("Output '{}' missing from completion", output_name))?;
    let params = DetectionParams::from(&config);
    let detections = detection::decode(predictions, completion.letterboxes_for(&input_name), 0, &params);

    for det in detections.iter().flatten() {
        tracing::info!(
            class_id = det.class_id,
            confidence = det.confidence,
            x = det.bbox.x,
            y = det.bbox.y,
            width = det.bbox.width,
            height = det.bbox.height,
            "Detection"
        );
    }
    tracing::info!(count = detections.iter().map(Vec::len).sum::<usize>(), "Done");
    Ok(())
}

/// Decode an image file into interleaved BGR pixels.
fn load_bgr(path: &str) -> anyhow::Result<BgrImage> {
    let rgb = image::open(path)
        .with_context(|| format!("Failed to open image {}", path))?
        .into_rgb8();
    let (width, height) = rgb.dimensions();
    let mut data = rgb.into_raw();
    for pixel in data.chunks_exact_mut(3) {
        pixel.swap(0, 2);
    }
    Ok(BgrImage::new(width, height, data)?)
}
