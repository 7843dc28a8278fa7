//! Continuous contact-quality measurement worker.
//!
//! The worker owns the matrix/LCR resource pair for the whole run: it closes
//! a configured set of matrix channels, puts the LCR meter into its reading
//! mode, and then streams `(primary, secondary)` readings to a subscriber
//! and into the shared-state cache slot until stopped.
//!
//! Two guarantees shape the implementation:
//!
//! - **Unconditional release.** Whatever ends the run (a stop request, a
//!   setup failure, or an instrument error mid-loop), the matrix channels
//!   are opened and the cache slot is removed exactly once before the run
//!   result is reported. The live API therefore never serves stale readings
//!   from a dead worker.
//! - **Cooperative cancellation.** The stop flag is observed only between
//!   iterations, at the sleep boundary; an in-flight acquisition is never
//!   interrupted.
//!
//! Precondition (enforced by the registry's exclusive guards): at most one
//! worker owns the matrix/LCR pair at a time.

use crate::error::{AppResult, ProbeError};
use crate::instrument::{LcrMeter, LcrReading, SwitchingMatrix};
use crate::registry::InstrumentRegistry;
use crate::state::{CachedReading, ProcessState, CONTACT_QUALITY_KEY};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Default pause between two acquisitions.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

/// Lifecycle of the worker task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Not started.
    Idle,
    /// Acquisition loop active.
    Running,
    /// Stop flag set; the loop finishes its current iteration.
    StopRequested,
    /// Task finished, cleanup done.
    Stopped,
}

#[derive(Debug)]
struct SharedStatus(RwLock<WorkerStatus>);

impl SharedStatus {
    fn new() -> Self {
        Self(RwLock::new(WorkerStatus::Idle))
    }

    fn get(&self) -> WorkerStatus {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, status: WorkerStatus) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn transition(&self, from: WorkerStatus, to: WorkerStatus) {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        if *guard == from {
            *guard = to;
        }
    }
}

/// Background worker streaming contact-quality readings.
pub struct ContactQualityWorker {
    registry: Arc<InstrumentRegistry>,
    state: ProcessState,
    channels: Vec<String>,
    interval: Duration,
    subscriber: Option<mpsc::UnboundedSender<LcrReading>>,
    status: Arc<SharedStatus>,
}

impl ContactQualityWorker {
    /// Create a worker over `registry`, publishing into `state`.
    pub fn new(registry: Arc<InstrumentRegistry>, state: ProcessState) -> Self {
        Self {
            registry,
            state,
            channels: Vec::new(),
            interval: DEFAULT_INTERVAL,
            subscriber: None,
            status: Arc::new(SharedStatus::new()),
        }
    }

    /// Matrix channels to close for the duration of the run.
    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = channels;
        self
    }

    /// Pause between two acquisitions.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Register the reading subscriber.
    ///
    /// The worker delivers readings to at most one subscriber; a later call
    /// replaces the earlier registration.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<LcrReading> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriber = Some(tx);
        rx
    }

    /// Current lifecycle state (`Idle` before `start`).
    pub fn status(&self) -> WorkerStatus {
        self.status.get()
    }

    /// Spawn the worker task and return its handle.
    pub fn start(self) -> WorkerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let status = Arc::clone(&self.status);
        status.set(WorkerStatus::Running);
        let task = tokio::spawn(self.run(stop_rx));
        WorkerHandle {
            stop_tx,
            status,
            task,
        }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>) -> AppResult<()> {
        info!(channels = ?self.channels, "contact quality worker starting");
        let outcome = async {
            let mut matrix = self.registry.acquire_matrix().await?;
            let mut lcr = self.registry.acquire_lcr().await?;

            let run_result = self.measure(&mut **matrix, &mut **lcr, &mut stop_rx).await;

            // Cleanup runs exactly once on every exit path out of the
            // measurement, error or not, before the result is reported.
            let release_result = matrix.open_all_channels().await;
            self.state.remove_reading(CONTACT_QUALITY_KEY);

            run_result.and(release_result)
        }
        .await;

        self.status.set(WorkerStatus::Stopped);
        match &outcome {
            Ok(()) => info!("contact quality worker stopped"),
            Err(err) => warn!(error = %err, "contact quality worker failed"),
        }
        outcome
    }

    async fn measure(
        &self,
        matrix: &mut dyn SwitchingMatrix,
        lcr: &mut dyn LcrMeter,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> AppResult<()> {
        matrix.close_channels(&self.channels).await?;
        // A relay fault may only surface in the error queue; closing is
        // "safe" once the queue confirms it is empty.
        if let Some(err) = matrix.next_error().await? {
            return Err(err.into());
        }
        lcr.reset().await?;
        lcr.configure().await?;

        while !*stop_rx.borrow() {
            let reading = lcr.acquire_reading().await?;
            if let Some(subscriber) = &self.subscriber {
                if subscriber.send(reading).is_err() {
                    debug!("reading subscriber dropped");
                }
            }
            self.state
                .insert_reading(CONTACT_QUALITY_KEY, CachedReading::now(reading));

            // The stop flag is observed only here, between acquisitions.
            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = stop_rx.changed() => {}
            }
        }
        Ok(())
    }
}

/// Handle to a running [`ContactQualityWorker`].
pub struct WorkerHandle {
    stop_tx: watch::Sender<bool>,
    status: Arc<SharedStatus>,
    task: JoinHandle<AppResult<()>>,
}

impl WorkerHandle {
    /// Current lifecycle state of the worker.
    pub fn status(&self) -> WorkerStatus {
        self.status.get()
    }

    /// Set the stop flag. The loop observes it at its next sleep boundary.
    pub fn request_stop(&self) {
        self.status
            .transition(WorkerStatus::Running, WorkerStatus::StopRequested);
        let _ = self.stop_tx.send(true);
    }

    /// Whether the worker task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request a stop and wait for the worker to finish.
    ///
    /// Returns the run result: `Ok` for a clean stop, the instrument or
    /// release error otherwise. Cleanup has already executed either way.
    pub async fn stop(self) -> AppResult<()> {
        self.request_stop();
        self.join().await
    }

    /// Wait for the worker to finish without requesting a stop.
    pub async fn join(self) -> AppResult<()> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(ProbeError::Logic(format!("worker task failed: {err}"))),
        }
    }
}
