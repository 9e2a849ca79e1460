use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error: {0}")]
    OnnxError(#[from] ort::Error),

    #[cfg(feature = "onnx")]
    #[error("Invalid input size: expected {expected}, got {actual}")]
    InvalidInputSize { expected: usize, actual: usize },

    #[error("Invalid output size: expected {expected} probabilities, got {actual}")]
    OutputLength { expected: usize, actual: usize },

    #[cfg(feature = "onnx")]
    #[error("No output tensor found")]
    NoOutputTensor,

    #[cfg(feature = "onnx")]
    #[error("Missing ONNX {kind}")]
    MissingIo { kind: &'static str },

    #[error("Model not loaded")]
    NotLoaded,

    #[error("Model error: {0}")]
    Backend(String),
}

/// Modelo entrenado visto como caja negra:
/// tensor plano [max_timesteps * num_features] → una probabilidad por etiqueta
pub trait GestureModel {
    fn predict(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError>;
}

impl<F> GestureModel for F
where
    F: FnMut(&[f32]) -> Result<Vec<f32>, ClassifierError>,
{
    fn predict(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        self(input)
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxGestureModel;

#[cfg(feature = "onnx")]
mod onnx {
    use log::info;
    use ort::session::Session;

    use super::{ClassifierError, GestureModel};

    /// Modelo de producción sobre ONNX Runtime, entrada [1, timesteps, features]
    pub struct OnnxGestureModel {
        session: Session,
        input_name: String,
        prob_output_name: String,
        max_timesteps: usize,
        num_features: usize,
    }

    impl OnnxGestureModel {
        pub fn new(
            model_path: &str,
            max_timesteps: usize,
            num_features: usize,
        ) -> Result<Self, ClassifierError> {
            let session = Session::builder()?.commit_from_file(model_path)?;

            let input_name = session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or(ClassifierError::MissingIo { kind: "input" })?;

            // Los modelos exportados tienen una única salida con las probabilidades
            let prob_output_name = session
                .outputs
                .first()
                .map(|output| output.name.clone())
                .ok_or(ClassifierError::MissingIo { kind: "output" })?;

            info!("[ONNX] Modelo cargado: {}", model_path);
            info!("[ONNX] Input: {}", input_name);
            info!("[ONNX] Output: {}", prob_output_name);

            Ok(Self {
                session,
                input_name,
                prob_output_name,
                max_timesteps,
                num_features,
            })
        }
    }

    impl GestureModel for OnnxGestureModel {
        fn predict(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
            let expected = self.max_timesteps * self.num_features;
            if input.len() != expected {
                return Err(ClassifierError::InvalidInputSize {
                    expected,
                    actual: input.len(),
                });
            }

            let shape_vec = vec![1_usize, self.max_timesteps, self.num_features];
            let input_value = ort::value::Value::from_array((shape_vec, input.to_vec()))?;

            let outputs = self.session.run(ort::inputs![
                self.input_name.as_str() => &input_value,
            ])?;

            let (prob_shape, prob_data) =
                outputs[self.prob_output_name.as_str()].try_extract_tensor::<f32>()?;
            if prob_data.is_empty() {
                return Err(ClassifierError::NoOutputTensor);
            }

            // Salida [1, clases] o [clases]
            let num_classes = if prob_shape.len() >= 2 {
                prob_shape[1] as usize
            } else {
                prob_data.len()
            };

            Ok(prob_data.iter().take(num_classes).copied().collect())
        }
    }
}
