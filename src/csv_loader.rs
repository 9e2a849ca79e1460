use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;

use crate::error::PipelineError;
use crate::types::{SensorFrame, NUM_FEATURES};

/// Cabecera de las sesiones grabadas y de las ventanas guardadas
pub const CSV_HEADER: &str = "flex0,flex1,flex2,flex3,flex4,qw,qx,qy,qz,ax,ay,az,gx,gy,gz";

/// Convierte una línea "v0,v1,...,v14" en un frame.
/// Rechaza un número de campos distinto de 15 y cualquier valor no numérico.
pub fn parse_sensor_line(line: &str) -> Result<SensorFrame, PipelineError> {
    let tokens: Vec<&str> = line.trim().split(',').collect();
    if tokens.len() != NUM_FEATURES {
        return Err(PipelineError::InvalidInput(format!(
            "invalid sensor data length: expected {}, got {}",
            NUM_FEATURES,
            tokens.len()
        )));
    }

    let mut frame = [0.0f32; NUM_FEATURES];
    for (i, token) in tokens.iter().enumerate() {
        frame[i] = parse_value(token).ok_or_else(|| {
            PipelineError::InvalidInput(format!("invalid value {:?} at channel {}", token.trim(), i))
        })?;
    }
    Ok(frame)
}

fn parse_value(token: &str) -> Option<f32> {
    token.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

/// Carga una sesión grabada: cabecera + 15 columnas numéricas por fila
pub fn load_frames_from_csv(path: impl AsRef<Path>) -> Result<Vec<SensorFrame>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut frames = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
        if record.len() != NUM_FEATURES {
            bail!(
                "La fila {} tiene {} columnas, se esperaban {}",
                row_idx + 1,
                record.len(),
                NUM_FEATURES
            );
        }

        let mut frame = [0.0f32; NUM_FEATURES];
        for (i, field) in record.iter().enumerate() {
            frame[i] = parse_value(field)
                .with_context(|| format!("Valor {:?} inválido en fila {}", field, row_idx + 1))?;
        }
        frames.push(frame);
    }

    if frames.is_empty() {
        bail!("El CSV {:?} no contiene datos", path);
    }

    Ok(frames)
}

/// Escribe una ventana en el mismo formato que las sesiones grabadas
pub fn write_window_csv(path: impl AsRef<Path>, window: &[SensorFrame]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{}", CSV_HEADER)?;

    for frame in window {
        let row: Vec<String> = frame.iter().map(|v| v.to_string()).collect();
        writeln!(file, "{}", row.join(","))?;
    }

    Ok(())
}

/// Guarda ventanas numeradas en `out_dir` con el prefijo dado
pub struct WindowWriter {
    out_dir: PathBuf,
    prefix: String,
    file_idx: u64,
}

impl WindowWriter {
    pub fn new(out_dir: impl Into<PathBuf>, prefix: &str) -> std::io::Result<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)?;
        Ok(Self {
            out_dir,
            prefix: prefix.to_string(),
            file_idx: 0,
        })
    }

    pub fn save(&mut self, window: &[SensorFrame]) -> std::io::Result<PathBuf> {
        let path = self
            .out_dir
            .join(format!("{}_{:05}.csv", self.prefix, self.file_idx));
        self.file_idx += 1;
        write_window_csv(&path, window)?;
        Ok(path)
    }
}
