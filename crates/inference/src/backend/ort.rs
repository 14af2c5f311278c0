use super::{BackendError, InferenceBackend, IoInfo, IoSignature, NamedTensor, missing_output};
use ort::{
    session::{Session, SessionInputValue, builder::GraphOptimizationLevel},
    value::{Tensor as OrtTensor, ValueType},
};
use std::borrow::Cow;
use tensor::Tensor;

/// ONNX Runtime engine on the CPU execution provider.
pub struct OrtBackend {
    session: Session,
    signature: IoSignature,
}

fn load_err(e: ort::Error) -> BackendError {
    BackendError::Load(e.to_string())
}

fn exec_err(e: ort::Error) -> BackendError {
    BackendError::Execution(e.to_string())
}

fn declared_shape(value_type: &ValueType) -> Vec<i64> {
    value_type
        .tensor_shape()
        .map(|shape| shape.iter().copied().collect())
        .unwrap_or_default()
}

impl InferenceBackend for OrtBackend {
    fn load_model(path: &str, threads: usize) -> Result<Self, BackendError> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let session = Session::builder()
            .map_err(load_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err)?
            .with_intra_threads(threads.max(1))
            .map_err(load_err)?
            .commit_from_file(path)
            .map_err(load_err)?;

        let signature = IoSignature {
            inputs: session
                .inputs()
                .iter()
                .map(|input| IoInfo::new(input.name(), &declared_shape(input.dtype())))
                .collect(),
            outputs: session
                .outputs()
                .iter()
                .map(|output| IoInfo::new(output.name(), &declared_shape(output.dtype())))
                .collect(),
        };

        tracing::info!(
            path,
            threads,
            inputs = ?signature.inputs,
            outputs = ?signature.outputs,
            "Model loaded"
        );
        Ok(Self { session, signature })
    }

    fn io_signature(&self) -> &IoSignature {
        &self.signature
    }

    fn infer(&mut self, inputs: &[NamedTensor]) -> Result<Vec<NamedTensor>, BackendError> {
        let mut feeds: Vec<(Cow<'_, str>, SessionInputValue<'_>)> = Vec::with_capacity(inputs.len());
        for input in inputs {
            let dims: Vec<i64> = input.tensor.shape().iter().map(|&d| d as i64).collect();
            let value = OrtTensor::from_array((dims, input.tensor.to_vec())).map_err(exec_err)?;
            feeds.push((Cow::from(input.name.as_str()), value.into()));
        }

        let outputs = self.session.run(feeds).map_err(exec_err)?;

        self.signature
            .outputs
            .iter()
            .map(|info| {
                let value = outputs
                    .get(info.name.as_str())
                    .ok_or_else(|| missing_output(&info.name))?;
                let (shape, data) = value.try_extract_tensor::<f32>().map_err(exec_err)?;
                named_output(&info.name, shape, data)
            })
            .collect()
    }
}

/// Copy an extracted output into an owned tensor. Dynamic (negative) dims count as 0.
fn named_output(name: &str, shape: &[i64], data: &[f32]) -> Result<NamedTensor, BackendError> {
    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    let tensor = Tensor::from_slice(&dims, data)
        .map_err(|e| BackendError::Execution(format!("output '{}': {}", name, e)))?;
    Ok(NamedTensor::new(name, tensor))
}
