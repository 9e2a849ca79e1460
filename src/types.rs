use crate::error::PipelineError;

/// Canales de un frame del guante:
/// [flex0..flex4, qw, qx, qy, qz, ax, ay, az, gx, gy, gz]
pub const NUM_FEATURES: usize = 15;

/// Frame crudo tal como llega del transporte (15 canales en orden fijo)
pub type SensorFrame = [f32; NUM_FEATURES];

/// Frame ya normalizado, mismo orden de canales
pub type FeatureVector = [f32; NUM_FEATURES];

/// Secuencia de frames de longitud variable que representa un gesto
pub type GestureWindow = Vec<SensorFrame>;

/// Constantes del guante
pub const NUM_FLEX: usize = 5;
pub const NUM_IMU: usize = 6;
pub const FLEX_RANGE: std::ops::Range<usize> = 0..5;
pub const ACCEL_RANGE: std::ops::Range<usize> = 9..12;
pub const GYRO_RANGE: std::ops::Range<usize> = 12..15;
pub const IMU_OFFSET: usize = 9;
pub const FLEX_SATURATION: f32 = 4095.0; // máximo del ADC de 12 bits

/// Etiqueta devuelta cuando la predicción no supera ambos umbrales
pub const UNCERTAIN_LABEL: &str = "UNCERTAIN";

/// Magnitud euclídea de la aceleración (canales 9-11)
pub fn accel_magnitude(frame: &SensorFrame) -> f32 {
    magnitude(&frame[ACCEL_RANGE])
}

/// Magnitud euclídea de la velocidad angular (canales 12-14)
pub fn gyro_magnitude(frame: &SensorFrame) -> f32 {
    magnitude(&frame[GYRO_RANGE])
}

fn magnitude(axes: &[f32]) -> f32 {
    axes.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Convierte un slice en SensorFrame; rechaza longitudes distintas de 15
/// y cualquier valor NaN o infinito
pub fn frame_from_slice(values: &[f32]) -> Result<SensorFrame, PipelineError> {
    let frame: SensorFrame = values.try_into().map_err(|_| {
        PipelineError::InvalidInput(format!(
            "expected {} channels per frame, got {}",
            NUM_FEATURES,
            values.len()
        ))
    })?;

    if let Some(channel) = frame.iter().position(|v| !v.is_finite()) {
        return Err(PipelineError::InvalidInput(format!(
            "invalid value {} at channel {}",
            frame[channel], channel
        )));
    }
    Ok(frame)
}

/// Copia un frame en formato plano [t * 15 + canal]
pub fn write_flat(frame: &FeatureVector, output: &mut [f32], time_idx: usize) {
    let base_idx = time_idx * NUM_FEATURES;
    output[base_idx..base_idx + NUM_FEATURES].copy_from_slice(frame);
}
