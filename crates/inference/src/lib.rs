pub mod backend;
pub mod config;
pub mod driver;
pub mod logging;
pub mod metrics;
pub mod processing;

pub use backend::{AsyncBackend, BackendError, InferenceBackend, IoInfo, IoSignature, NamedTensor, Threaded};
pub use config::InferenceConfig;
pub use driver::{Completion, Driver, DriverError};
pub use processing::{
    Detection, DetectionParams, Mask, PoseParams, PoseResult, SegmentationParams, SegmentationResult,
};
