//! Raster task descriptors and the worker-pool seam.
//!
//! Rasterization is the only asynchronous boundary in the engine. Tasks are
//! plain `Send` descriptors — no tile references cross the seam — and
//! completions travel back over a channel that the tile manager drains on
//! the scheduling thread. A completion whose task or tile has since been
//! cancelled or destroyed is simply discarded there.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use terrazzo_geometry::Rect;
use terrazzo_tiles::{
    Color, LayerId, PaintSource, RasterCanvas, RasterMode, RasterTaskId, TileId,
};

use crate::cancel::CancellationToken;

/// Everything a worker needs to rasterize one tile version.
#[derive(Debug, Clone)]
pub struct RasterTask {
    pub task_id: RasterTaskId,
    pub tile_id: TileId,
    pub layer_id: LayerId,
    pub content_rect: Rect,
    pub contents_scale: f32,
    pub mode: RasterMode,
}

/// What a finished raster task produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterOutcome {
    /// Analysis found a single solid color; no pixels were produced and no
    /// resource is needed.
    SolidColor(Color),
    /// Pixels were produced; the manager acquires a resource of `bytes` on
    /// completion.
    Pixels { bytes: usize, has_text: bool },
}

/// Completion report delivered back to the scheduling thread.
#[derive(Debug, Clone)]
pub struct RasterCompletion {
    pub task_id: RasterTaskId,
    pub tile_id: TileId,
    pub mode: RasterMode,
    pub outcome: RasterOutcome,
}

/// Dispatches raster tasks for execution.
///
/// Implementations deliver a [`RasterCompletion`] for every task that runs;
/// a task whose token is cancelled before it starts may complete silently
/// with no report.
pub trait RasterWorker {
    fn schedule(&self, task: RasterTask, token: CancellationToken);
}

/// Execute one task against the paint source.
///
/// Returns `None` when the token was cancelled before work started.
fn execute_task(
    paint: &dyn PaintSource,
    task: &RasterTask,
    token: &CancellationToken,
) -> Option<RasterCompletion> {
    if token.is_cancelled() {
        return None;
    }

    let analysis = paint.analyze(task.content_rect, task.contents_scale);
    let outcome = match analysis.solid_color {
        Some(color) => RasterOutcome::SolidColor(color),
        None => {
            let mut canvas = RasterCanvas::new(task.content_rect.size);
            paint.raster(&mut canvas, task.content_rect, task.contents_scale);
            RasterOutcome::Pixels {
                bytes: canvas.byte_size(),
                has_text: analysis.has_text,
            }
        }
    };

    Some(RasterCompletion {
        task_id: task.task_id,
        tile_id: task.tile_id,
        mode: task.mode,
        outcome,
    })
}

/// Runs tasks synchronously on the scheduling thread.
///
/// Used in tests and for software-only configurations where a thread pool
/// buys nothing; completions still flow through the channel so the manager's
/// completion path is identical.
pub struct ImmediateRasterWorker {
    paint: Arc<dyn PaintSource>,
    completions: Sender<RasterCompletion>,
}

impl ImmediateRasterWorker {
    pub fn new(paint: Arc<dyn PaintSource>, completions: Sender<RasterCompletion>) -> Self {
        Self { paint, completions }
    }
}

impl RasterWorker for ImmediateRasterWorker {
    fn schedule(&self, task: RasterTask, token: CancellationToken) {
        if let Some(completion) = execute_task(self.paint.as_ref(), &task, &token) {
            let _ = self.completions.send(completion);
        }
    }
}

/// Configuration for the threaded worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads. Default: available parallelism.
    pub num_workers: usize,
    /// How long an idle worker waits for a task before checking shutdown.
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl WorkerPoolConfig {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// A pool of worker threads executing raster tasks.
///
/// Workers pull tasks from an internal queue, execute them against the paint
/// source, and send completions back to the scheduling thread. Cancellation
/// is cooperative: a cancelled task that has not started is dropped with no
/// completion.
pub struct ThreadedRasterWorker {
    task_sender: Sender<(RasterTask, CancellationToken)>,
    shutdown: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl ThreadedRasterWorker {
    pub fn new(
        paint: Arc<dyn PaintSource>,
        completions: Sender<RasterCompletion>,
        config: WorkerPoolConfig,
    ) -> Self {
        let (task_sender, task_receiver) = std::sync::mpsc::channel();
        let task_receiver = Arc::new(Mutex::new(task_receiver));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut threads = Vec::with_capacity(config.num_workers);
        for index in 0..config.num_workers {
            let paint = Arc::clone(&paint);
            let completions = completions.clone();
            let receiver = Arc::clone(&task_receiver);
            let shutdown_flag = Arc::clone(&shutdown);
            let poll_interval = config.poll_interval;

            let handle = thread::Builder::new()
                .name(format!("terrazzo-raster-{index}"))
                .spawn(move || {
                    Self::run(paint, completions, receiver, shutdown_flag, poll_interval);
                })
                .expect("failed to spawn raster worker thread");
            threads.push(handle);
        }

        Self {
            task_sender,
            shutdown,
            threads,
        }
    }

    fn run(
        paint: Arc<dyn PaintSource>,
        completions: Sender<RasterCompletion>,
        receiver: Arc<Mutex<Receiver<(RasterTask, CancellationToken)>>>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            let next = {
                let receiver = receiver.lock().unwrap();
                receiver.recv_timeout(poll_interval)
            };

            match next {
                Ok((task, token)) => {
                    if let Some(completion) = execute_task(paint.as_ref(), &task, &token) {
                        if completions.send(completion).is_err() {
                            break;
                        }
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    pub fn num_workers(&self) -> usize {
        self.threads.len()
    }

    /// Signal shutdown and wait for workers to drain.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Release);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl RasterWorker for ThreadedRasterWorker {
    fn schedule(&self, task: RasterTask, token: CancellationToken) {
        let _ = self.task_sender.send((task, token));
    }
}

impl Drop for ThreadedRasterWorker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}
