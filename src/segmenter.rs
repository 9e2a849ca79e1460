use log::debug;

use crate::config::MLConfig;
use crate::types::{accel_magnitude, gyro_magnitude, GestureWindow, SensorFrame};

/// Frames quietos seguidos durante el arranque que anulan un falso inicio
pub const FALSE_START_FRAMES: usize = 3;

/// Parámetros de configuración del segmentador
#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterParams {
    /// Umbral de |acc| para considerar el frame en movimiento (default: 0.25)
    pub motion_threshold: f32,
    /// Umbral de |gyro| para considerar el frame en movimiento (default: 35.0)
    pub rotation_threshold: f32,
    /// Frames en movimiento seguidos para confirmar el inicio (default: 4)
    pub min_active_frames: usize,
    /// Frames quietos seguidos para confirmar el final (default: 8)
    pub stable_frames: usize,
    /// Mínimo de frames para considerar el gesto válido (default: 15)
    pub min_gesture_frames: usize,
    /// Máximo de frames antes de forzar la emisión (default: 60)
    pub max_gesture_frames: usize,
}

impl Default for SegmenterParams {
    fn default() -> Self {
        Self {
            motion_threshold: 0.25,
            rotation_threshold: 35.0,
            min_active_frames: 4,
            stable_frames: 8,
            min_gesture_frames: 15,
            max_gesture_frames: 60,
        }
    }
}

impl From<&MLConfig> for SegmenterParams {
    fn from(config: &MLConfig) -> Self {
        Self {
            motion_threshold: config.motion_threshold,
            rotation_threshold: config.rotation_threshold,
            min_active_frames: config.min_active_frames,
            stable_frames: config.stable_frames,
            min_gesture_frames: config.min_gesture_frames,
            max_gesture_frames: config.max_gesture_frames,
        }
    }
}

impl SegmenterParams {
    /// Movimiento significativo: |acc| o |gyro| por encima de su umbral
    pub fn is_moving(&self, frame: &SensorFrame) -> bool {
        accel_magnitude(frame) > self.motion_threshold
            || gyro_magnitude(frame) > self.rotation_threshold
    }
}

/// Fases de la máquina de estados
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Esperando movimiento
    #[default]
    Idle,
    /// Movimiento detectado, pendiente de confirmar
    Starting,
    /// Capturando el gesto
    Active,
    /// Quieto el tiempo suficiente, se decide si el gesto termina
    Ending,
}

/// Lo que reporta el segmentador tras cada frame
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentStatus {
    Idle,
    Start,
    Active { frame_count: usize },
    /// Gesto completo; la ventana pasa a ser propiedad del llamador
    End(GestureWindow),
}

/// Estado del segmentador como valor: fase + buffer + contadores.
/// Una instancia por sesión; nunca se comparte entre flujos.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SegmenterState {
    phase: Phase,
    buffer: GestureWindow,
    active_count: usize,
    stable_count: usize,
}

impl SegmenterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Transición pura: consume el estado y un frame, devuelve el nuevo estado
    /// y lo que hay que reportar. Ninguna transición falla.
    pub fn advance(
        mut self,
        frame: SensorFrame,
        params: &SegmenterParams,
    ) -> (SegmenterState, SegmentStatus) {
        let moving = params.is_moving(&frame);

        match self.phase {
            Phase::Idle => {
                if !moving {
                    return (self, SegmentStatus::Idle);
                }
                self.phase = Phase::Starting;
                self.buffer.clear();
                self.buffer.push(frame);
                self.active_count = 1;
                self.stable_count = 0;
                (self, SegmentStatus::Start)
            }

            Phase::Starting => {
                self.buffer.push(frame);

                if moving {
                    self.active_count += 1;
                    self.stable_count = 0;
                    if self.active_count >= params.min_active_frames {
                        self.phase = Phase::Active;
                    }
                    return self.accumulating();
                }

                self.stable_count += 1;
                if self.stable_count >= FALSE_START_FRAMES {
                    debug!("Falso inicio descartado ({} frames)", self.buffer.len());
                    return (Self::default(), SegmentStatus::Idle);
                }
                self.accumulating()
            }

            Phase::Active => {
                self.buffer.push(frame);

                if !moving {
                    self.stable_count += 1;
                    if self.stable_count >= params.stable_frames {
                        self.phase = Phase::Ending;
                    }
                    return self.accumulating();
                }

                self.stable_count = 0;
                if self.buffer.len() >= params.max_gesture_frames {
                    debug!("Gesto emitido por longitud máxima ({} frames)", self.buffer.len());
                    return self.emit();
                }
                self.accumulating()
            }

            Phase::Ending => {
                self.buffer.push(frame);

                if moving {
                    // Falsa parada: se vuelve a capturar sin comprobar la longitud máxima
                    self.phase = Phase::Active;
                    self.stable_count = 0;
                    return self.accumulating();
                }

                self.stable_count += 1;
                if self.stable_count < params.stable_frames {
                    return self.accumulating();
                }

                if self.buffer.len() >= params.min_gesture_frames {
                    debug!("Gesto completo ({} frames)", self.buffer.len());
                    self.emit()
                } else {
                    debug!("Gesto demasiado corto descartado ({} frames)", self.buffer.len());
                    (Self::default(), SegmentStatus::Idle)
                }
            }
        }
    }

    /// Vuelve a Idle descartando cualquier captura en curso
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn accumulating(self) -> (SegmenterState, SegmentStatus) {
        let frame_count = self.buffer.len();
        (self, SegmentStatus::Active { frame_count })
    }

    fn emit(self) -> (SegmenterState, SegmentStatus) {
        (Self::default(), SegmentStatus::End(self.buffer))
    }
}

/// Segmenta un flujo grabado completo y devuelve las ventanas emitidas
pub fn segment_stream(frames: &[SensorFrame], params: &SegmenterParams) -> Vec<GestureWindow> {
    let mut state = SegmenterState::new();
    let mut windows = Vec::new();

    for frame in frames {
        let (next, status) = state.advance(*frame, params);
        state = next;
        if let SegmentStatus::End(window) = status {
            windows.push(window);
        }
    }

    windows
}
