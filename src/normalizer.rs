//! Normalización de frames al espacio de entrenamiento del modelo.
//!
//! - Flex (0-4): min-max a [0, 1], lecturas saturadas (>= 4095) forzadas a 1.0
//! - Cuaterniones (5-8): sin cambios, ya vienen normalizados del guante
//! - IMU (9-14): z-score con la media/std de entrenamiento

use log::warn;

use crate::config::{NormalizationParams, STD_EPSILON};
use crate::error::{PipelineError, Result};
use crate::types::{FeatureVector, SensorFrame, FLEX_RANGE, FLEX_SATURATION, IMU_OFFSET, NUM_FLEX};

/// Resultado de normalizar una ventana
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWindow {
    pub frames: Vec<FeatureVector>,
    /// Lecturas flex que llegaron al máximo del ADC
    pub saturated_readings: usize,
}

impl NormalizedWindow {
    /// Porcentaje de lecturas flex saturadas sobre el total de la ventana
    pub fn saturation_pct(&self) -> f32 {
        let total = self.frames.len() * NUM_FLEX;
        if total == 0 {
            return 0.0;
        }
        self.saturated_readings as f32 / total as f32 * 100.0
    }
}

/// Normaliza una secuencia de frames crudos.
/// Nunca rechaza valores fuera de rango: se recortan o pasan sin cambios.
pub fn normalize_window(
    frames: &[SensorFrame],
    params: Option<&NormalizationParams>,
) -> Result<NormalizedWindow> {
    let params = params.ok_or_else(|| {
        PipelineError::Configuration("normalization parameters not loaded".to_string())
    })?;

    let imu_stats = params.imu_stats();
    if imu_stats.is_none() {
        warn!("⚠️  Parámetros de normalización IMU no encontrados, canales 9-14 sin estandarizar");
    }

    let mut saturated_readings = 0;
    let normalized: Vec<FeatureVector> = frames
        .iter()
        .map(|frame| {
            let mut out = *frame;

            for i in FLEX_RANGE {
                let (min, max) = (params.flex_min[i], params.flex_max[i]);
                if max > min {
                    let saturated = frame[i] >= FLEX_SATURATION;
                    if saturated {
                        saturated_readings += 1;
                        out[i] = 1.0;
                    } else {
                        out[i] = ((frame[i] - min) / (max - min)).clamp(0.0, 1.0);
                    }
                }
            }

            if let Some((means, stds)) = imu_stats {
                for (k, (mean, std)) in means.iter().zip(stds.iter()).enumerate() {
                    if *std > STD_EPSILON {
                        let i = IMU_OFFSET + k;
                        out[i] = (frame[i] - mean) / std;
                    }
                }
            }

            out
        })
        .collect();

    let window = NormalizedWindow {
        frames: normalized,
        saturated_readings,
    };

    if window.saturated_readings > 0 {
        warn!(
            "⚠️  Saturación detectada: {}/{} lecturas ({:.1}%) en {}",
            window.saturated_readings,
            window.frames.len() * NUM_FLEX,
            window.saturation_pct(),
            FLEX_SATURATION
        );
    }

    Ok(window)
}
