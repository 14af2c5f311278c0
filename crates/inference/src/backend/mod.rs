use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tensor::Tensor;
use thiserror::Error;

#[cfg(feature = "ort-backend")]
pub mod ort;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("Inference failed: {0}")]
    Execution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A model input or output bound to its graph name.
#[derive(Debug, Clone)]
pub struct NamedTensor {
    pub name: String,
    pub tensor: Tensor<'static, f32>,
}

impl NamedTensor {
    pub fn new(name: impl Into<String>, tensor: Tensor<'static, f32>) -> Self {
        Self {
            name: name.into(),
            tensor,
        }
    }
}

/// Name and declared shape of one model input or output. Dynamic dimensions are `-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoInfo {
    pub name: String,
    pub shape: Vec<i64>,
}

impl IoInfo {
    pub fn new(name: impl Into<String>, shape: &[i64]) -> Self {
        Self {
            name: name.into(),
            shape: shape.to_vec(),
        }
    }

    /// Whether `dims` fits this declaration, treating non-positive entries as wildcards.
    pub fn accepts(&self, dims: &[usize]) -> bool {
        dims.len() == self.shape.len()
            && self
                .shape
                .iter()
                .zip(dims)
                .all(|(&declared, &actual)| declared <= 0 || declared as usize == actual)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoSignature {
    pub inputs: Vec<IoInfo>,
    pub outputs: Vec<IoInfo>,
}

impl IoSignature {
    pub fn input(&self, name: &str) -> Option<&IoInfo> {
        self.inputs.iter().find(|info| info.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&IoInfo> {
        self.outputs.iter().find(|info| info.name == name)
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|info| info.name.clone()).collect()
    }
}

/// Synchronous inference engine.
pub trait InferenceBackend: Send + 'static {
    fn load_model(path: &str, threads: usize) -> Result<Self, BackendError>
    where
        Self: Sized;

    fn io_signature(&self) -> &IoSignature;

    /// Run one forward pass. Outputs are returned in signature order.
    fn infer(&mut self, inputs: &[NamedTensor]) -> Result<Vec<NamedTensor>, BackendError>;
}

pub type CompletionFn = Box<dyn FnOnce(Result<Vec<NamedTensor>, BackendError>) + Send + 'static>;

/// Engine that runs submissions off the caller's thread.
///
/// When `submit` returns `Ok`, `on_complete` is invoked exactly once from a
/// backend-owned thread. When it returns `Err`, `on_complete` is dropped
/// without being called.
pub trait AsyncBackend: Send + Sync + 'static {
    fn io_signature(&self) -> &IoSignature;

    fn submit(
        &self,
        inputs: Vec<NamedTensor>,
        output_names: Vec<String>,
        on_complete: CompletionFn,
    ) -> Result<(), BackendError>;
}

/// Runs a synchronous [`InferenceBackend`] on a dedicated worker thread per submission.
pub struct Threaded<B> {
    engine: Arc<Mutex<B>>,
    signature: IoSignature,
}

impl<B: InferenceBackend> Threaded<B> {
    pub fn new(engine: B) -> Self {
        let signature = engine.io_signature().clone();
        Self {
            engine: Arc::new(Mutex::new(engine)),
            signature,
        }
    }

    pub fn load_model(path: &str, threads: usize) -> Result<Self, BackendError> {
        Ok(Self::new(B::load_model(path, threads)?))
    }
}

impl<B: InferenceBackend> AsyncBackend for Threaded<B> {
    fn io_signature(&self) -> &IoSignature {
        &self.signature
    }

    fn submit(
        &self,
        inputs: Vec<NamedTensor>,
        output_names: Vec<String>,
        on_complete: CompletionFn,
    ) -> Result<(), BackendError> {
        let engine = Arc::clone(&self.engine);
        thread::Builder::new()
            .name("inference-worker".to_string())
            .spawn(move || {
                let result = {
                    let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
                    engine.infer(&inputs)
                };
                on_complete(result.and_then(|outputs| select_outputs(outputs, &output_names)));
            })?;
        Ok(())
    }
}

pub(crate) fn missing_output(name: &str) -> BackendError {
    BackendError::Execution(format!("missing output '{}'", name))
}

/// Keep the requested outputs, in request order. An empty request keeps everything.
fn select_outputs(
    mut outputs: Vec<NamedTensor>,
    names: &[String],
) -> Result<Vec<NamedTensor>, BackendError> {
    if names.is_empty() {
        return Ok(outputs);
    }
    names
        .iter()
        .map(|name| {
            outputs
                .iter()
                .position(|out| &out.name == name)
                .map(|idx| outputs.swap_remove(idx))
                .ok_or_else(|| missing_output(name))
        })
        .collect()
}
