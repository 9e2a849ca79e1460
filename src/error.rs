use thiserror::Error;

use crate::classifier::ClassifierError;

/// Errores de la canalización frame → palabra
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Falta calibración, etiquetas o configuración del modelo
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Frame de longitud incorrecta, línea mal formada o ventana vacía
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// El modelo falló o devolvió una salida con forma inesperada
    #[error("Classifier failure: {0}")]
    ClassifierFailure(#[from] ClassifierError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
