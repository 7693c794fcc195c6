//! The server's single presentation session.
//!
//! A [`Session`] owns the shared [`UiState`], the broadcast channel and the
//! handle of the in-flight run. REST and WebSocket handlers both go through
//! it, so the in-flight guard and the feature toggles apply the same way to
//! every client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use copilot_rs::PipelineError;
use copilot_rs::pipeline::{CompositeEventHandler, LoggingHandler, PatientContext, Pipeline};
use copilot_rs::ui::event_handler::UiEventHandler;
use copilot_rs::ui::{self, SummaryExport, UiState};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcast::{WebBroadcastHandler, WsMessage};
use crate::snapshot::UiStateSnapshot;

/// The run currently in flight, tagged so a finished task only clears its
/// own slot.
struct RunningTask {
    id: u64,
    handle: JoinHandle<()>,
}

/// Shared, cheaply clonable handle to the session.
#[derive(Clone)]
pub struct Session {
    pipeline: Arc<Pipeline>,
    ui_state: Arc<Mutex<UiState>>,
    broadcast_tx: broadcast::Sender<WsMessage>,
    running: Arc<Mutex<Option<RunningTask>>>,
    next_run_id: Arc<AtomicU64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Session {
    pub fn new(
        pipeline: Arc<Pipeline>,
        ui_state: Arc<Mutex<UiState>>,
        broadcast_tx: broadcast::Sender<WsMessage>,
    ) -> Self {
        Self {
            pipeline,
            ui_state,
            broadcast_tx,
            running: Arc::new(Mutex::new(None)),
            next_run_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.broadcast_tx.subscribe()
    }

    pub fn snapshot(&self) -> UiStateSnapshot {
        UiStateSnapshot::from_ui_state(&lock(&self.ui_state))
    }

    fn broadcast(&self, msg: WsMessage) {
        let _ = self.broadcast_tx.send(msg);
    }

    /// Start a run in the background.
    ///
    /// Fails with a validation error for a blank context and with
    /// [`PipelineError::Busy`] while another run is in flight. Progress is
    /// reported through the shared state and the broadcast channel.
    pub fn submit(&self, context: &str) -> Result<(), PipelineError> {
        let context = PatientContext::parse(context)?;
        ui::begin_run(&self.ui_state, &context)?;

        let id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let session = self.clone();

        // Hold the slot while spawning so a fast run cannot finish before
        // its handle is recorded.
        let mut running = lock(&self.running);
        let handle = tokio::spawn(async move {
            let handler = CompositeEventHandler::new()
                .with(LoggingHandler)
                .with(UiEventHandler::new(session.ui_state.clone()))
                .with(WebBroadcastHandler::new(session.broadcast_tx.clone()));

            // Failures are already reported through the handlers.
            let _ = session.pipeline.run(context.as_str(), &handler).await;
            session.finish(id);
        });
        *running = Some(RunningTask { id, handle });
        debug!("Run {id} started");
        Ok(())
    }

    fn finish(&self, id: u64) {
        let mut running = lock(&self.running);
        if running.as_ref().is_some_and(|task| task.id == id) {
            *running = None;
        }
    }

    /// Abort the in-flight run and return the session to `Idle`. Returns
    /// `false` when nothing was running.
    ///
    /// Resolves only after the run's task has stopped, so no event from the
    /// aborted run lands after the reset.
    pub async fn cancel(&self) -> bool {
        let task = lock(&self.running).take();
        let Some(task) = task else {
            return false;
        };

        task.handle.abort();
        if let Err(e) = task.handle.await
            && !e.is_cancelled()
        {
            warn!("Run {} ended abnormally: {e}", task.id);
        }

        ui::cancel_reset(&self.ui_state);
        info!("Run {} cancelled", task.id);
        self.broadcast(WsMessage::Cancelled);
        self.broadcast(WsMessage::Snapshot {
            data: self.snapshot().to_json(),
        });
        true
    }

    pub fn clear_enabled(&self) -> bool {
        lock(&self.ui_state).features.clear
    }

    /// Reset the session. Rejected with [`PipelineError::Busy`] while a run
    /// is in flight; callers check [`clear_enabled`](Self::clear_enabled).
    pub fn clear(&self) -> Result<(), PipelineError> {
        ui::clear(&self.ui_state)?;
        self.broadcast(WsMessage::Cleared);
        self.broadcast(WsMessage::Snapshot {
            data: self.snapshot().to_json(),
        });
        Ok(())
    }

    /// The downloadable summary, or `None` when export is disabled.
    pub fn export(&self) -> Option<SummaryExport> {
        let state = lock(&self.ui_state);
        state.features.export.then(|| state.export())
    }
}
