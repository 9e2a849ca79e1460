//! Clasificación en segundo plano.
//!
//! El segmentador sigue acumulando frames en el hilo de la sesión mientras
//! un hilo aparte ejecuta el modelo sobre las ventanas ya emitidas. Cada
//! ventana viaja por valor, así que no hay buffers compartidos.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, warn};

use crate::classifier::{ClassifierError, GestureModel};
use crate::config::ModelAssets;
use crate::csv_loader::parse_sensor_line;
use crate::decision::ClassificationResult;
use crate::error::{PipelineError, Result};
use crate::pipeline::classify_window;
use crate::segmenter::{SegmentStatus, SegmenterParams, SegmenterState};
use crate::types::{GestureWindow, SensorFrame};

/// Ventanas en cola antes de bloquear al productor
pub const DEFAULT_QUEUE_LEN: usize = 8;

struct WindowJob {
    id: u64,
    window: GestureWindow,
}

/// Resultado de una ventana enviada al worker
#[derive(Debug)]
pub struct WindowOutcome {
    pub id: u64,
    pub frames: usize,
    pub result: Result<ClassificationResult>,
}

/// Emisor de resultados compartido con el hilo; al cancelar se vacía
type ResultSlot = Arc<Mutex<Option<Sender<WindowOutcome>>>>;

fn lock_slot(slot: &ResultSlot) -> MutexGuard<'_, Option<Sender<WindowOutcome>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Hilo dueño del modelo que clasifica ventanas en orden de llegada
pub struct ClassificationWorker {
    jobs: Option<Sender<WindowJob>>,
    results: Receiver<WindowOutcome>,
    result_slot: ResultSlot,
    handle: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    next_id: u64,
}

impl ClassificationWorker {
    pub fn spawn<M>(assets: Arc<ModelAssets>, model: M, queue_len: usize) -> Self
    where
        M: GestureModel + Send + 'static,
    {
        let (job_tx, job_rx) = bounded::<WindowJob>(queue_len.max(1));
        let (result_tx, result_rx) = unbounded::<WindowOutcome>();
        let result_slot: ResultSlot = Arc::new(Mutex::new(Some(result_tx)));
        let slot_worker = Arc::clone(&result_slot);
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_worker = Arc::clone(&cancelled);

        let handle = std::thread::spawn(move || {
            let mut model = model;
            for job in job_rx.iter() {
                if cancelled_worker.load(Ordering::Acquire) {
                    break;
                }
                let result = classify_window(&assets, &mut model, &job.window);
                let outcome = WindowOutcome {
                    id: job.id,
                    frames: job.window.len(),
                    result,
                };

                // Se envía con el slot bloqueado: tras cancelar ya no hay emisor
                let slot = lock_slot(&slot_worker);
                let Some(result_tx) = slot.as_ref() else {
                    break;
                };
                if result_tx.send(outcome).is_err() {
                    break;
                }
            }
            debug!("Worker de clasificación detenido");
        });

        Self {
            jobs: Some(job_tx),
            results: result_rx,
            result_slot,
            handle: Some(handle),
            cancelled,
            next_id: 0,
        }
    }

    /// Encola una ventana; devuelve su identificador
    pub fn submit(&mut self, window: GestureWindow) -> Result<u64> {
        let id = self.next_id;
        let jobs = self.jobs.as_ref().ok_or_else(worker_stopped)?;
        jobs.send(WindowJob { id, window }).map_err(|_| worker_stopped())?;
        self.next_id += 1;
        Ok(id)
    }

    pub fn results(&self) -> &Receiver<WindowOutcome> {
        &self.results
    }

    /// Cierra la cola, espera a que termine lo pendiente y devuelve lo que quede
    pub fn finish(mut self) -> Vec<WindowOutcome> {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("El worker de clasificación terminó con pánico");
            }
        }
        self.results.try_iter().collect()
    }

    /// Abandona la sesión: lo encolado y lo que esté en curso se descarta
    pub fn cancel(self) {
        // Drop hace el trabajo
    }
}

impl Drop for ClassificationWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancelled.store(true, Ordering::Release);
            lock_slot(&self.result_slot).take();
        }
        self.jobs.take();
    }
}

fn worker_stopped() -> PipelineError {
    PipelineError::ClassifierFailure(ClassifierError::Backend(
        "classification worker stopped".to_string(),
    ))
}

/// Sesión de un guante con clasificación asíncrona:
/// el segmentador vive aquí y las ventanas completas se envían al worker
pub struct GestureSession {
    params: SegmenterParams,
    segmenter: SegmenterState,
    worker: ClassificationWorker,
}

impl GestureSession {
    pub fn start<M>(assets: Arc<ModelAssets>, model: M) -> Self
    where
        M: GestureModel + Send + 'static,
    {
        let params = SegmenterParams::from(assets.config());
        Self {
            params,
            segmenter: SegmenterState::new(),
            worker: ClassificationWorker::spawn(assets, model, DEFAULT_QUEUE_LEN),
        }
    }

    /// Avanza el segmentador; si se completa un gesto devuelve el id del trabajo
    pub fn feed(&mut self, frame: SensorFrame) -> Result<Option<u64>> {
        let state = std::mem::take(&mut self.segmenter);
        let (next, status) = state.advance(frame, &self.params);
        self.segmenter = next;

        match status {
            SegmentStatus::End(window) => {
                debug!("Ventana de {} frames enviada al clasificador", window.len());
                self.worker.submit(window).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn feed_line(&mut self, line: &str) -> Result<Option<u64>> {
        let frame = parse_sensor_line(line)?;
        self.feed(frame)
    }

    pub fn segmenter(&self) -> &SegmenterState {
        &self.segmenter
    }

    pub fn results(&self) -> &Receiver<WindowOutcome> {
        self.worker.results()
    }

    /// Fin de flujo: espera las ventanas pendientes
    pub fn finish(self) -> Vec<WindowOutcome> {
        self.worker.finish()
    }

    /// Fin abrupto: nada pendiente llega a publicarse
    pub fn cancel(self) {
        self.worker.cancel();
    }
}
