//! Orquestación: frame crudo → segmentador → (ventana completa) →
//! normalización → ajuste de longitud → modelo → decisión.

use std::sync::Arc;

use log::{debug, info};

use crate::classifier::{ClassifierError, GestureModel};
use crate::config::{MLConfig, ModelAssets};
use crate::csv_loader::parse_sensor_line;
use crate::decision::{decide, ClassificationResult, DecisionThresholds};
use crate::error::{PipelineError, Result};
use crate::normalizer::normalize_window;
use crate::segmenter::{SegmentStatus, SegmenterParams, SegmenterState};
use crate::shaper::{flatten_window, shape_window};
use crate::types::{frame_from_slice, SensorFrame};

/// Lo que produce la canalización por cada frame
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Idle,
    Start,
    Active { frame_count: usize },
    Classified(ClassificationResult),
}

/// Normaliza, ajusta y aplana una ventana al tensor de entrada del modelo
pub fn prepare_input(assets: &ModelAssets, window: &[SensorFrame]) -> Result<Vec<f32>> {
    let config = assets.config();
    let normalized = normalize_window(window, Some(&config.normalization))?;
    let shaped = shape_window(normalized.frames, config.max_timesteps)?;
    Ok(flatten_window(&shaped))
}

/// Clasifica una ventana completa con el modelo dado
pub fn classify_window(
    assets: &ModelAssets,
    model: &mut dyn GestureModel,
    window: &[SensorFrame],
) -> Result<ClassificationResult> {
    let input = prepare_input(assets, window)?;
    debug!("Ejecutando inferencia ({} valores)...", input.len());

    let probabilities = model.predict(&input)?;
    let result = decide(&probabilities, assets.labels(), DecisionThresholds::from(assets.config()))?;

    info!(
        "Predicción: {} ({:.2}%, margen {:.2})",
        result.label,
        result.confidence * 100.0,
        result.margin
    );
    Ok(result)
}

/// Canalización síncrona de una sesión del guante
pub struct GesturePipeline {
    assets: Option<Arc<ModelAssets>>,
    params: SegmenterParams,
    segmenter: SegmenterState,
    model: Option<Box<dyn GestureModel + Send>>,
}

impl GesturePipeline {
    /// Canalización sin configurar: cualquier frame falla con error de configuración
    pub fn new() -> Self {
        Self {
            assets: None,
            params: SegmenterParams::default(),
            segmenter: SegmenterState::new(),
            model: None,
        }
    }

    pub fn with_assets(assets: Arc<ModelAssets>) -> Self {
        let mut pipeline = Self::new();
        pipeline.configure(assets);
        pipeline
    }

    /// Carga configuración y vocabulario; reinicia el segmentador
    pub fn configure(&mut self, assets: Arc<ModelAssets>) {
        self.params = SegmenterParams::from(assets.config());
        self.assets = Some(assets);
        self.segmenter.reset();
    }

    pub fn set_model<M>(&mut self, model: M)
    where
        M: GestureModel + Send + 'static,
    {
        self.model = Some(Box::new(model));
    }

    /// Libera el modelo; la canalización deja de estar lista
    pub fn unload_model(&mut self) {
        self.model = None;
    }

    pub fn is_ready(&self) -> bool {
        self.assets.is_some() && self.model.is_some()
    }

    pub fn labels(&self) -> &[String] {
        self.assets.as_deref().map(ModelAssets::labels).unwrap_or(&[])
    }

    pub fn config(&self) -> Option<&MLConfig> {
        self.assets.as_deref().map(ModelAssets::config)
    }

    pub fn segmenter(&self) -> &SegmenterState {
        &self.segmenter
    }

    /// Descarta cualquier gesto en curso
    pub fn reset(&mut self) {
        self.segmenter.reset();
    }

    /// Procesa un frame. Si completa un gesto, lo clasifica antes de volver.
    /// Un fallo del modelo solo afecta a esa ventana: el segmentador ya está en Idle.
    pub fn process_frame(&mut self, frame: SensorFrame) -> Result<PipelineEvent> {
        if self.assets.is_none() {
            return Err(not_configured());
        }

        let state = std::mem::take(&mut self.segmenter);
        let (next, status) = state.advance(frame, &self.params);
        self.segmenter = next;

        match status {
            SegmentStatus::Idle => Ok(PipelineEvent::Idle),
            SegmentStatus::Start => Ok(PipelineEvent::Start),
            SegmentStatus::Active { frame_count } => Ok(PipelineEvent::Active { frame_count }),
            SegmentStatus::End(window) => {
                info!("🖐️  Gesto detectado ({} frames)", window.len());
                self.classify(&window).map(PipelineEvent::Classified)
            }
        }
    }

    /// Igual que `process_frame`, validando antes la longitud
    pub fn process_values(&mut self, values: &[f32]) -> Result<PipelineEvent> {
        let frame = frame_from_slice(values)?;
        self.process_frame(frame)
    }

    /// Ingesta de texto: "v0,v1,...,v14"
    pub fn process_line(&mut self, line: &str) -> Result<PipelineEvent> {
        let frame = parse_sensor_line(line)?;
        self.process_frame(frame)
    }

    /// Clasifica una ventana ya segmentada
    pub fn classify(&mut self, window: &[SensorFrame]) -> Result<ClassificationResult> {
        let assets = self.assets.as_deref().ok_or_else(not_configured)?;
        let model = self.model.as_mut().ok_or(ClassifierError::NotLoaded)?;
        classify_window(assets, model.as_mut(), window)
    }
}

impl Default for GesturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn not_configured() -> PipelineError {
    PipelineError::Configuration("model config and labels not loaded".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::config::tests::{test_config, test_labels};
    use crate::segmenter::Phase;
    use crate::types::{NUM_FEATURES, UNCERTAIN_LABEL};

    fn assets() -> Arc<ModelAssets> {
        Arc::new(ModelAssets::new(test_labels(), test_config()).unwrap())
    }

    fn fixed_model(probs: Vec<f32>) -> impl FnMut(&[f32]) -> std::result::Result<Vec<f32>, ClassifierError> {
        move |_input: &[f32]| Ok(probs.clone())
    }

    fn frame_with(overrides: &[(usize, f32)]) -> SensorFrame {
        let mut frame = [0.0f32; NUM_FEATURES];
        for &(idx, value) in overrides {
            frame[idx] = value;
        }
        frame
    }

    fn moving() -> SensorFrame {
        frame_with(&[(0, 1550.0), (9, 1.0)])
    }

    fn still() -> SensorFrame {
        frame_with(&[(0, 1550.0)])
    }

    /// Alimenta un gesto completo y devuelve el evento final
    fn perform_gesture(pipeline: &mut GesturePipeline) -> Result<PipelineEvent> {
        for _ in 0..20 {
            pipeline.process_frame(moving())?;
        }
        let mut last = PipelineEvent::Idle;
        for _ in 0..=test_config().stable_frames {
            last = pipeline.process_frame(still())?;
        }
        Ok(last)
    }

    #[test]
    fn end_to_end_confident_word() {
        let mut pipeline = GesturePipeline::with_assets(assets());
        pipeline.set_model(fixed_model(vec![0.02, 0.85, 0.03, 0.02, 0.03, 0.02, 0.03]));
        assert!(pipeline.is_ready());

        match perform_gesture(&mut pipeline).unwrap() {
            PipelineEvent::Classified(result) => {
                assert_eq!(result.label, "hello");
                assert!(result.accepted);
                assert!((result.confidence - 0.85).abs() < 1e-6);
                assert!((result.margin - 0.82).abs() < 1e-5);
            }
            other => panic!("se esperaba una clasificación, llegó {:?}", other),
        }
        assert_eq!(pipeline.segmenter().phase(), Phase::Idle);
    }

    #[test]
    fn end_to_end_near_uniform_is_uncertain() {
        let mut pipeline = GesturePipeline::with_assets(assets());
        pipeline.set_model(fixed_model(vec![0.15, 0.16, 0.14, 0.15, 0.13, 0.14, 0.13]));

        let window = vec![still(); 30];
        let result = pipeline.classify(&window).unwrap();
        assert_eq!(result.label, UNCERTAIN_LABEL);
        assert!(!result.accepted);
        assert!((result.margin - 0.01).abs() < 1e-5);
    }

    #[test]
    fn model_receives_flattened_normalized_window() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let mut pipeline = GesturePipeline::with_assets(assets());
        pipeline.set_model(move |input: &[f32]| -> std::result::Result<Vec<f32>, ClassifierError> {
            *sink.lock().unwrap() = input.to_vec();
            Ok(vec![1.0 / 7.0; 7])
        });

        // 2 frames → relleno hasta 30 repitiendo el último
        let window = vec![frame_with(&[(0, 100.0)]), frame_with(&[(0, 1550.0), (9, 0.6)])];
        pipeline.classify(&window).unwrap();

        let input = captured.lock().unwrap();
        assert_eq!(input.len(), 30 * 15);
        assert_eq!(input[0], 0.0);
        assert!((input[15] - 0.5).abs() < 1e-2);
        assert!((input[15 + 9] - 1.0).abs() < 1e-5);
        assert!((input[29 * 15] - 0.5).abs() < 1e-2);
    }

    #[test]
    fn unconfigured_pipeline_fails_fast() {
        let mut pipeline = GesturePipeline::new();
        assert!(!pipeline.is_ready());
        assert!(pipeline.labels().is_empty());
        assert!(pipeline.config().is_none());
        let err = pipeline.process_frame(moving()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert_eq!(pipeline.segmenter().phase(), Phase::Idle);
    }

    #[test]
    fn classifier_failure_does_not_stall_segmenter() {
        let mut pipeline = GesturePipeline::with_assets(assets());
        pipeline.set_model(|_: &[f32]| -> std::result::Result<Vec<f32>, ClassifierError> {
            Err(ClassifierError::Backend("boom".to_string()))
        });

        let err = perform_gesture(&mut pipeline).unwrap_err();
        assert!(matches!(err, PipelineError::ClassifierFailure(_)));
        assert_eq!(pipeline.segmenter().phase(), Phase::Idle);

        // El siguiente frame se acepta con normalidad
        assert_eq!(pipeline.process_frame(moving()).unwrap(), PipelineEvent::Start);
    }

    #[test]
    fn wrong_length_model_output_is_classifier_failure() {
        let mut pipeline = GesturePipeline::with_assets(assets());
        pipeline.set_model(fixed_model(vec![0.5, 0.5]));
        let err = pipeline.classify(&[still()]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ClassifierFailure(ClassifierError::OutputLength { expected: 7, actual: 2 })
        ));
    }

    #[test]
    fn missing_model_is_classifier_failure() {
        let mut pipeline = GesturePipeline::with_assets(assets());
        let err = pipeline.classify(&[still()]).unwrap_err();
        assert!(matches!(err, PipelineError::ClassifierFailure(ClassifierError::NotLoaded)));

        pipeline.set_model(fixed_model(vec![0.0; 7]));
        pipeline.unload_model();
        assert!(!pipeline.is_ready());
    }

    #[test]
    fn empty_window_is_invalid_input() {
        let mut pipeline = GesturePipeline::with_assets(assets());
        pipeline.set_model(fixed_model(vec![0.0; 7]));
        let err = pipeline.classify(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn malformed_frames_leave_state_untouched() {
        let mut pipeline = GesturePipeline::with_assets(assets());
        pipeline.process_frame(moving()).unwrap();
        let before = pipeline.segmenter().clone();

        assert!(matches!(pipeline.process_values(&[1.0; 14]), Err(PipelineError::InvalidInput(_))));
        let mut nan_flex = moving();
        nan_flex[0] = f32::NAN;
        assert!(matches!(pipeline.process_values(&nan_flex), Err(PipelineError::InvalidInput(_))));
        assert!(matches!(pipeline.process_line("1,2,3"), Err(PipelineError::InvalidInput(_))));
        assert_eq!(pipeline.segmenter(), &before);

        let event = pipeline
            .process_line("1550,0,0,0,0, 1,0,0,0, 1.0,0,0, 0,0,0")
            .unwrap();
        assert_eq!(event, PipelineEvent::Active { frame_count: 2 });
    }

    #[test]
    fn reset_and_accessors() {
        let mut pipeline = GesturePipeline::with_assets(assets());
        assert_eq!(pipeline.labels().len(), 7);
        assert_eq!(pipeline.config().map(|c| c.max_timesteps), Some(30));

        pipeline.process_frame(moving()).unwrap();
        pipeline.reset();
        assert_eq!(pipeline.process_frame(still()).unwrap(), PipelineEvent::Idle);
    }
}
