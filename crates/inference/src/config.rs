use common::env_or;
use std::env;
use std::time::Duration;

pub use common::Environment;

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub environment: Environment,
    pub model_path: String,
    pub model_threads: usize,
    pub input_size: (u32, u32),
    pub normalize_input: bool,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub keypoint_threshold: f32,
    pub run_timeout: Duration,
    pub poll_interval: Duration,
    pub otel_endpoint: Option<String>,
    pub image_path: Option<String>,
}

impl InferenceConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let model_path = env::var("MODEL_PATH").unwrap_or_else(|_| "models/yolov8n.onnx".to_string());

        let confidence_threshold: f32 = env_or("CONFIDENCE_THRESHOLD", 0.25);
        let nms_threshold: f32 = env_or("NMS_THRESHOLD", 0.2);
        let keypoint_threshold: f32 = env_or("KEYPOINT_THRESHOLD", 0.5);
        for (name, value) in [
            ("CONFIDENCE_THRESHOLD", confidence_threshold),
            ("NMS_THRESHOLD", nms_threshold),
            ("KEYPOINT_THRESHOLD", keypoint_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, value);
            }
        }

        Ok(Self {
            environment,
            model_path,
            model_threads: env_or("MODEL_THREADS", 2),
            input_size: (env_or("INPUT_WIDTH", 640), env_or("INPUT_HEIGHT", 640)),
            normalize_input: env_or("NORMALIZE_INPUT", true),
            confidence_threshold,
            nms_threshold,
            keypoint_threshold,
            run_timeout: Duration::from_millis(env_or("RUN_TIMEOUT_MS", 10_000)),
            poll_interval: Duration::from_millis(env_or("POLL_INTERVAL_MS", 10)),
            otel_endpoint: env::var("OTEL_ENDPOINT").ok().filter(|s| !s.is_empty()),
            image_path: env::var("IMAGE_PATH").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Create default configuration for testing
    #[cfg(test)]
    pub fn test_default() -> Self {
        Self {
            environment: Environment::Development,
            model_path: "/models/model.onnx".to_string(),
            model_threads: 2,
            input_size: (640, 640),
            normalize_input: true,
            confidence_threshold: 0.25,
            nms_threshold: 0.2,
            keypoint_threshold: 0.5,
            run_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(10),
            otel_endpoint: None,
            image_path: None,
        }
    }
}
