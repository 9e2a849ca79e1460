use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use log::{info, warn};

use quirosigno::config::ModelAssets;
use quirosigno::csv_loader::{load_frames_from_csv, WindowWriter};
use quirosigno::logger::init_logger;
use quirosigno::pipeline::prepare_input;
use quirosigno::segmenter::{segment_stream, SegmenterParams};

const USAGE: &str = "Uso: replay_csv [--config config.json] [--labels labels.json] \
[--model model.onnx] [--save-windows DIR] [--dump-flat] <sesion.csv>";

struct ReplayOptions {
    config_path: PathBuf,
    labels_path: PathBuf,
    model_path: Option<PathBuf>,
    save_dir: Option<PathBuf>,
    dump_flat: bool,
}

fn parse_args() -> Result<(PathBuf, ReplayOptions)> {
    let mut opts = ReplayOptions {
        config_path: PathBuf::from("models/config.json"),
        labels_path: PathBuf::from("models/labels.json"),
        model_path: None,
        save_dir: None,
        dump_flat: false,
    };
    let mut csv_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dump-flat" => opts.dump_flat = true,
            "--config" => opts.config_path = next_path(&mut args, &arg)?,
            "--labels" => opts.labels_path = next_path(&mut args, &arg)?,
            "--model" => opts.model_path = Some(next_path(&mut args, &arg)?),
            "--save-windows" => opts.save_dir = Some(next_path(&mut args, &arg)?),
            _ => {
                if csv_path.is_some() {
                    bail!(USAGE);
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path = csv_path.ok_or_else(|| anyhow!("Debes especificar un archivo CSV\n{}", USAGE))?;
    Ok((csv_path, opts))
}

fn next_path(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<PathBuf> {
    args.next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("{} necesita una ruta\n{}", flag, USAGE))
}

#[cfg(feature = "onnx")]
fn load_model(
    path: &std::path::Path,
    assets: &ModelAssets,
) -> Result<Option<Box<dyn quirosigno::GestureModel>>> {
    let config = assets.config();
    let path = path
        .to_str()
        .ok_or_else(|| anyhow!("Ruta de modelo no válida: {:?}", path))?;
    let model =
        quirosigno::classifier::OnnxGestureModel::new(path, config.max_timesteps, config.num_features)?;
    Ok(Some(Box::new(model)))
}

#[cfg(not(feature = "onnx"))]
fn load_model(
    path: &std::path::Path,
    _assets: &ModelAssets,
) -> Result<Option<Box<dyn quirosigno::GestureModel>>> {
    warn!("⚠️  Compilado sin soporte ONNX, se ignora el modelo {:?}", path);
    Ok(None)
}

fn main() -> Result<()> {
    init_logger();
    let (csv_path, opts) = parse_args()?;
    println!("🎞️  Reproduciendo sesión desde {:?}", csv_path);

    let assets = ModelAssets::load(&opts.config_path, &opts.labels_path)?;
    let params = SegmenterParams::from(assets.config());

    let frames = load_frames_from_csv(&csv_path)?;
    info!("📥 {} frames cargados", frames.len());

    let windows = segment_stream(&frames, &params);
    println!("🖐️  {} gestos detectados", windows.len());

    let mut writer = match &opts.save_dir {
        Some(dir) => Some(WindowWriter::new(dir, "gesto")?),
        None => None,
    };

    let mut model = match &opts.model_path {
        Some(path) => load_model(path, &assets)?,
        None => None,
    };

    for (idx, window) in windows.iter().enumerate() {
        println!("\n#{:03}: {} frames", idx, window.len());

        if let Some(writer) = writer.as_mut() {
            let path = writer.save(window)?;
            println!("  💾 Guardado en {:?}", path);
        }

        if let Some(model) = model.as_mut() {
            let result = quirosigno::pipeline::classify_window(&assets, model.as_mut(), window)?;
            let verdict = if result.accepted { "✅" } else { "🤷" };
            println!(
                "  {} {} ({:.1}%, margen {:.2})",
                verdict,
                result.label,
                result.confidence * 100.0,
                result.margin
            );

            let mut ranked = result.probabilities.clone();
            ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
            println!("  Top-5 probabilidades:");
            for (rank, entry) in ranked.iter().take(5).enumerate() {
                println!("    {:>2}. {:<25} {:>6.2}%", rank + 1, entry.label, entry.probability * 100.0);
            }
        }

        if opts.dump_flat {
            let flat = prepare_input(&assets, window)?;
            println!("  🧱 Tensor plano ({} valores):", flat.len());
            for (i, value) in flat.iter().enumerate() {
                println!("    {:03}: {:>12.6}", i, value);
            }
        }
    }

    if windows.is_empty() {
        warn!("⚠️  No se detectó ningún gesto en la sesión");
    }

    Ok(())
}
