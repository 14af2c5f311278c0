use crate::config::InferenceConfig;

pub const SERVICE_NAME: &str = "inference";

pub fn setup_logging(config: &InferenceConfig) -> anyhow::Result<()> {
    common::setup_logging(SERVICE_NAME, config.environment)
}
