/*
Quirosigno - reconocimiento de señas en tiempo real

Lee frames del guante como líneas de texto por stdin:
    flex0..flex4, qw, qx, qy, qz, ax, ay, az, gx, gy, gz
segmenta los gestos automáticamente, los clasifica con el modelo ONNX en un
hilo aparte y escribe cada palabra reconocida como una línea JSON en stdout.

Antes de todo, asegurarse de tener onnxruntime instalado.
wget https://github.com/microsoft/onnxruntime/releases/download/v1.22.0/onnxruntime-linux-x64-1.22.0.tgz
tar -xzf onnxruntime-linux-x64-1.22.0.tgz

Este binario solo se compila con la feature `onnx`.

Para compilar y ejecutar:
    cargo build --release --features onnx
    set -x LD_LIBRARY_PATH (pwd)/onnxruntime-linux-x64-1.22.0/lib $LD_LIBRARY_PATH
    cat sesion.csv | ./target/release/quirosigno models/config.json models/labels.json models/model.onnx
*/

use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select};
use log::{debug, error, info, warn};

use quirosigno::classifier::OnnxGestureModel;
use quirosigno::config::ModelAssets;
use quirosigno::csv_loader::CSV_HEADER;
use quirosigno::logger::init_logger;
use quirosigno::PipelineError;
use quirosigno::worker::{GestureSession, WindowOutcome};

const DEFAULT_CONFIG: &str = "models/config.json";
const DEFAULT_LABELS: &str = "models/labels.json";
const DEFAULT_MODEL: &str = "models/model.onnx";

struct DaemonArgs {
    config_path: String,
    labels_path: String,
    model_path: String,
}

fn parse_args() -> DaemonArgs {
    let mut args = env::args().skip(1);
    DaemonArgs {
        config_path: args.next().unwrap_or_else(|| DEFAULT_CONFIG.to_string()),
        labels_path: args.next().unwrap_or_else(|| DEFAULT_LABELS.to_string()),
        model_path: args.next().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    }
}

fn load_model(path: &str, assets: &ModelAssets) -> Result<OnnxGestureModel> {
    let config = assets.config();
    OnnxGestureModel::new(path, config.max_timesteps, config.num_features)
        .with_context(|| format!("No se pudo cargar el modelo {}", path))
}

fn publish(outcome: WindowOutcome) -> Result<()> {
    match outcome.result {
        Ok(result) if result.accepted => {
            info!(
                "✅ Seña #{}: {} ({:.1}%)",
                outcome.id,
                result.label,
                result.confidence * 100.0
            );
            let mut stdout = io::stdout().lock();
            serde_json::to_writer(&mut stdout, &result)?;
            writeln!(stdout)?;
            stdout.flush()?;
        }
        Ok(result) => {
            info!(
                "🤷 Seña #{} incierta ({:.1}%, margen {:.2})",
                outcome.id,
                result.confidence * 100.0,
                result.margin
            );
        }
        Err(e) => error!("❌ Error clasificando ventana #{} ({} frames): {}", outcome.id, outcome.frames, e),
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logger();
    info!("🎯 Quirosigno - reconocimiento de señas");

    let args = parse_args();

    info!("🔧 Cargando configuración y etiquetas...");
    let assets = Arc::new(
        ModelAssets::load(&args.config_path, &args.labels_path).context("Recursos del modelo inválidos")?,
    );
    info!("✅ {} etiquetas cargadas", assets.labels().len());

    info!("🔧 Inicializando clasificador...");
    let model = load_model(&args.model_path, &assets)?;
    info!("✅ Clasificador cargado");

    // Canal para recibir líneas de stdin
    let (tx, rx) = bounded::<String>(100);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("❌ Error leyendo stdin: {}", e);
                    break;
                }
            }
        }
    });

    let mut session = GestureSession::start(Arc::clone(&assets), model);
    let results = session.results().clone();
    let mut frames_received = 0u64;
    let mut invalid_lines = 0u64;

    info!("🎬 Esperando frames por stdin...");

    loop {
        select! {
            recv(rx) -> msg => {
                let Ok(line) = msg else {
                    break;
                };
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed == CSV_HEADER {
                    continue;
                }

                match session.feed_line(trimmed) {
                    Ok(Some(id)) => debug!("🖐️  Gesto #{} en cola", id),
                    Ok(None) => {}
                    Err(e @ PipelineError::InvalidInput(_)) => {
                        invalid_lines += 1;
                        warn!("⚠️  Línea descartada: {}", e);
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
                frames_received += 1;
            }
            recv(results) -> outcome => {
                if let Ok(outcome) = outcome {
                    publish(outcome)?;
                }
            }
        }
    }

    info!("📭 Fin de la entrada, esperando clasificaciones pendientes...");
    for outcome in session.finish() {
        publish(outcome)?;
    }

    info!(
        "👋 Sesión terminada: {} frames, {} líneas descartadas",
        frames_received, invalid_lines
    );
    Ok(())
}
