use crate::backend::{AsyncBackend, BackendError, IoInfo, IoSignature, NamedTensor};
use crate::metrics::DriverMetrics;
use common::span;
use crossbeam_channel::{Receiver, Sender};
use preprocess::{BgrImage, Letterbox, PreprocessError, images_to_tensor};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tensor::{Tensor, TensorError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("A task is running")]
    Busy,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),

    #[error("Preprocess error: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("Run did not finish within {0:?}")]
    Timeout(Duration),
}

/// Outcome of one admitted run.
#[derive(Debug)]
pub struct Completion {
    /// Letterboxes of the staged images, per input name. Empty for raw tensor submissions.
    pub letterboxes: HashMap<String, Vec<Letterbox>>,
    pub outputs: Result<Vec<NamedTensor>, BackendError>,
    pub elapsed: Duration,
}

impl Completion {
    pub fn is_ok(&self) -> bool {
        self.outputs.is_ok()
    }

    pub fn output(&self, name: &str) -> Option<&Tensor<'static, f32>> {
        self.outputs
            .as_ref()
            .ok()?
            .iter()
            .find(|out| out.name == name)
            .map(|out| &out.tensor)
    }

    pub fn letterboxes_for(&self, input: &str) -> &[Letterbox] {
        self.letterboxes.get(input).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Holds the run flag for one admitted run and clears it when dropped.
struct RunPermit {
    flag: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Single-flight front end to an [`AsyncBackend`].
///
/// At most one run is in flight. A submission while a run is in flight fails
/// immediately with [`DriverError::Busy`]; nothing is queued. The run flag is
/// cleared before the completion is delivered, so a callback may resubmit.
pub struct Driver<B> {
    backend: B,
    running: Arc<AtomicBool>,
    normalize: bool,
    completion_tx: Sender<Completion>,
    completion_rx: Receiver<Completion>,
    metrics: DriverMetrics,
}

impl<B: AsyncBackend> Driver<B> {
    /// `normalize` divides staged image pixels by 255.
    pub fn new(backend: B, normalize: bool) -> Self {
        let (completion_tx, completion_rx) = crossbeam_channel::unbounded();
        Self {
            backend,
            running: Arc::new(AtomicBool::new(false)),
            normalize,
            completion_tx,
            completion_rx,
            metrics: DriverMetrics::new("inference"),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn io_signature(&self) -> &IoSignature {
        self.backend.io_signature()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Completions of runs started with [`Driver::submit`] or [`Driver::exec_images`].
    pub fn completions(&self) -> &Receiver<Completion> {
        &self.completion_rx
    }

    /// Run raw input tensors; the completion is posted to [`Driver::completions`].
    pub fn submit(&self, inputs: Vec<NamedTensor>) -> Result<(), DriverError> {
        let tx = self.completion_tx.clone();
        self.submit_with(inputs, move |completion| post(&tx, completion))
    }

    /// Run raw input tensors and hand the completion to `on_complete` on the backend thread.
    ///
    /// Every input must be an owned tensor named after a model input.
    pub fn submit_with<F>(&self, inputs: Vec<NamedTensor>, on_complete: F) -> Result<(), DriverError>
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let permit = self.admit()?;
        self.validate_tensors(&inputs)?;
        self.launch(permit, inputs, HashMap::new(), on_complete)
    }

    /// Letterbox and stage images per model input, then run them.
    ///
    /// `size` is `(width, height)` and is only consulted for inputs whose
    /// spatial dimensions are dynamic.
    pub fn exec_images(
        &self,
        images: HashMap<String, Vec<BgrImage>>,
        size: Option<(u32, u32)>,
    ) -> Result<(), DriverError> {
        let tx = self.completion_tx.clone();
        self.exec_images_with(images, size, move |completion| post(&tx, completion))
    }

    pub fn exec_images_with<F>(
        &self,
        images: HashMap<String, Vec<BgrImage>>,
        size: Option<(u32, u32)>,
        on_complete: F,
    ) -> Result<(), DriverError>
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let permit = self.admit()?;
        let _s = span!("exec_images");

        let signature = self.backend.io_signature();
        if images.len() != signature.inputs.len() {
            return Err(invalid("parameter error"));
        }

        let mut inputs = Vec::with_capacity(signature.inputs.len());
        let mut letterboxes = HashMap::with_capacity(signature.inputs.len());
        for info in &signature.inputs {
            let batch = images
                .get(&info.name)
                .ok_or_else(|| invalid("Parameter names do not match"))?;
            let target = image_input_size(info, batch.len(), size)?;

            let (tensor, boxes) = images_to_tensor(batch, target, self.normalize)?;
            inputs.push(NamedTensor::new(info.name.clone(), tensor));
            letterboxes.insert(info.name.clone(), boxes);
        }

        self.launch(permit, inputs, letterboxes, on_complete)
    }

    /// Poll [`Driver::is_running`] until the in-flight run finishes.
    ///
    /// A run cannot be cancelled; a timeout here means the run is still going.
    pub fn wait_until_idle(&self, timeout: Duration, poll_interval: Duration) -> Result<(), DriverError> {
        if common::poll_until(|| !self.is_running(), timeout, poll_interval, "inference run") {
            Ok(())
        } else {
            Err(DriverError::Timeout(timeout))
        }
    }

    fn admit(&self) -> Result<RunPermit, DriverError> {
        match self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(RunPermit {
                flag: Arc::clone(&self.running),
            }),
            Err(_) => {
                self.metrics.record_rejection();
                tracing::debug!("Submission rejected: a run is in flight");
                Err(DriverError::Busy)
            }
        }
    }

    fn validate_tensors(&self, inputs: &[NamedTensor]) -> Result<(), DriverError> {
        let signature = self.backend.io_signature();
        let names: HashSet<&str> = inputs.iter().map(|input| input.name.as_str()).collect();
        if inputs.len() != signature.inputs.len() || names.len() != inputs.len() {
            return Err(invalid("parameter error"));
        }

        for input in inputs {
            let info = signature
                .input(&input.name)
                .ok_or_else(|| invalid("Parameter names do not match"))?;
            if input.tensor.is_absent() || !input.tensor.is_owned() {
                return Err(DriverError::InvalidInput(format!(
                    "input '{}' must be an owned, non-empty tensor",
                    input.name
                )));
            }
            if !info.accepts(input.tensor.shape()) {
                return Err(invalid("The input shape does not match"));
            }
        }
        Ok(())
    }

    fn launch<F>(
        &self,
        permit: RunPermit,
        inputs: Vec<NamedTensor>,
        letterboxes: HashMap<String, Vec<Letterbox>>,
        on_complete: F,
    ) -> Result<(), DriverError>
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let started = Instant::now();
        let metrics = self.metrics.clone();
        let output_names = self.backend.io_signature().output_names();

        let shapes: Vec<_> = inputs.iter().map(|i| (&i.name, i.tensor.shape())).collect();
        tracing::debug!(inputs = ?shapes, "Submitting run");

        // On a synchronous submit error the closure is dropped, which releases the permit.
        self.backend.submit(
            inputs,
            output_names,
            Box::new(move |outputs: Result<Vec<NamedTensor>, BackendError>| {
                let elapsed = started.elapsed();
                drop(permit);

                metrics.record_completion(elapsed, outputs.is_ok());
                match &outputs {
                    Ok(outs) => tracing::debug!(outputs = outs.len(), ?elapsed, "Run completed"),
                    Err(e) => tracing::warn!(error = %e, ?elapsed, "Run failed"),
                }

                on_complete(Completion {
                    letterboxes,
                    outputs,
                    elapsed,
                });
            }),
        )?;
        Ok(())
    }
}

fn invalid(message: &str) -> DriverError {
    DriverError::InvalidInput(message.to_string())
}

fn post(tx: &Sender<Completion>, completion: Completion) {
    if tx.send(completion).is_err() {
        tracing::debug!("Completion dropped: driver no longer listening");
    }
}

/// Validate an image input declaration against a batch and resolve its `(width, height)`.
fn image_input_size(
    info: &IoInfo,
    batch: usize,
    size: Option<(u32, u32)>,
) -> Result<(u32, u32), DriverError> {
    let shape = &info.shape;
    if shape.len() != 4 {
        return Err(invalid("Image processing input must be [BCHW]"));
    }
    if batch == 0 || (shape[0] > 0 && shape[0] as usize != batch) {
        return Err(invalid("The input shape does not match"));
    }
    if shape[1] != 3 {
        return Err(invalid("The model must receive 3 channel images"));
    }

    let (req_w, req_h) = size.unwrap_or((0, 0));
    let height = if shape[2] > 0 { shape[2] as u32 } else { req_h };
    let width = if shape[3] > 0 { shape[3] as u32 } else { req_w };
    if width == 0 || height == 0 {
        return Err(invalid("Picture size error"));
    }
    Ok((width, height))
}
