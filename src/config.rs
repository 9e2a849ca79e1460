use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{NUM_FEATURES, NUM_FLEX, NUM_IMU};

/// Desviación estándar mínima para estandarizar un canal IMU
pub const STD_EPSILON: f32 = 1e-6;

/// Calibración por canal, exportada junto al modelo entrenado
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub flex_min: [f32; NUM_FLEX],
    pub flex_max: [f32; NUM_FLEX],
    /// Media de [ax, ay, az, gx, gy, gz]; puede faltar en exportaciones antiguas
    #[serde(default)]
    pub feature_means: Option<[f32; NUM_IMU]>,
    #[serde(default)]
    pub feature_stds: Option<[f32; NUM_IMU]>,
}

impl NormalizationParams {
    /// Pares (media, std) de los canales IMU, si están ambos
    pub fn imu_stats(&self) -> Option<([f32; NUM_IMU], [f32; NUM_IMU])> {
        Some((self.feature_means?, self.feature_stds?))
    }
}

/// Configuración del modelo (config.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLConfig {
    pub max_timesteps: usize,
    pub num_features: usize,
    pub confidence_threshold: f32,
    pub margin_threshold: f32,
    pub motion_threshold: f32,
    pub rotation_threshold: f32,
    pub stable_frames: usize,
    pub min_gesture_frames: usize,
    pub max_gesture_frames: usize,
    /// Frames en movimiento necesarios para confirmar el inicio de un gesto
    #[serde(default = "default_min_active_frames")]
    pub min_active_frames: usize,
    pub normalization: NormalizationParams,
}

fn default_min_active_frames() -> usize {
    4
}

impl MLConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: MLConfig = serde_json::from_str(&content).map_err(|e| {
            PipelineError::Configuration(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Comprueba que la configuración es utilizable por la canalización.
    /// Las calibraciones degeneradas solo se avisan: esos canales pasan sin escalar.
    pub fn validate(&self) -> Result<()> {
        if self.num_features != NUM_FEATURES {
            return Err(config_error(format!(
                "num_features must be {}, got {}",
                NUM_FEATURES, self.num_features
            )));
        }
        if self.max_timesteps == 0 {
            return Err(config_error("max_timesteps must be positive"));
        }
        if self.stable_frames == 0 || self.min_active_frames == 0 {
            return Err(config_error(
                "stable_frames and min_active_frames must be positive",
            ));
        }
        if self.min_gesture_frames == 0 || self.min_gesture_frames > self.max_gesture_frames {
            return Err(config_error(format!(
                "invalid gesture length bounds: min={} max={}",
                self.min_gesture_frames, self.max_gesture_frames
            )));
        }
        let thresholds = [
            ("confidence_threshold", self.confidence_threshold),
            ("margin_threshold", self.margin_threshold),
            ("motion_threshold", self.motion_threshold),
            ("rotation_threshold", self.rotation_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(config_error(format!("{} must be finite and >= 0, got {}", name, value)));
            }
        }

        let norm = &self.normalization;
        for (i, (min, max)) in norm.flex_min.iter().zip(&norm.flex_max).enumerate() {
            if max <= min {
                warn!("⚠️  Flex {} con calibración degenerada (min={}, max={}), se usará sin escalar", i, min, max);
            }
        }
        match norm.imu_stats() {
            Some((_, stds)) => {
                for (i, std) in stds.iter().enumerate() {
                    if *std <= STD_EPSILON {
                        warn!("⚠️  Canal IMU {} con std={} , se usará sin estandarizar", i, std);
                    }
                }
            }
            None => warn!("⚠️  Parámetros de normalización IMU ausentes en la configuración"),
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct LabelsJson {
    labels: Vec<String>,
}

/// Carga el vocabulario ordenado desde labels.json: {"labels": [...]}
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        PipelineError::Configuration(format!("cannot read {}: {}", path.display(), e))
    })?;
    let data: LabelsJson = serde_json::from_str(&content).map_err(|e| {
        PipelineError::Configuration(format!("invalid labels {}: {}", path.display(), e))
    })?;
    Ok(data.labels)
}

/// Configuración y vocabulario del modelo; solo lectura, compartible entre sesiones
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAssets {
    labels: Vec<String>,
    config: MLConfig,
}

impl ModelAssets {
    /// Construye a partir de datos ya cargados
    pub fn new(labels: Vec<String>, config: MLConfig) -> Result<Self> {
        config.validate()?;
        if labels.is_empty() {
            return Err(config_error("label vocabulary is empty"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = labels.iter().find(|label| !seen.insert(label.as_str())) {
            return Err(config_error(format!("duplicated label {:?}", dup)));
        }
        Ok(Self { labels, config })
    }

    pub fn load(config_path: impl AsRef<Path>, labels_path: impl AsRef<Path>) -> Result<Self> {
        let config = MLConfig::load(config_path)?;
        let labels = load_labels(labels_path)?;
        info!("[MODELO] Clases: {:?}", labels);
        Self::new(labels, config)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn config(&self) -> &MLConfig {
        &self.config
    }

    /// Tamaño del tensor plano de entrada [max_timesteps * num_features]
    pub fn input_len(&self) -> usize {
        self.config.max_timesteps * self.config.num_features
    }
}

fn config_error(msg: impl Into<String>) -> PipelineError {
    PipelineError::Configuration(msg.into())
}
