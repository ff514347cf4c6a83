//! Upload orchestrator runtime.
//!
//! A single task owns the [`UploadMachine`] and is its only writer. Consumer
//! events and transport completions are both delivered to that task as
//! messages, so they are applied one at a time in arrival order.
//!
//! A cancelled call keeps draining in the background until it returns. A new
//! batch started meanwhile fires that call's token at once and holds its
//! first file until the call has reported back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::{FileHandle, TimeoutTransport, UploadError, UploadTransport};

use super::config::OrchestratorConfig;
use super::machine::{Effect, UploadMachine};
use super::types::{OrchestratorError, UploadEvent, UploadSnapshot, UploadState};

type Reply = oneshot::Sender<Result<UploadSnapshot, OrchestratorError>>;

enum Command {
    Event { event: UploadEvent, reply: Reply },
    Shutdown,
}

/// Result of one transport call, tagged with the attempt and file it belongs to.
struct Completion {
    attempt_id: u64,
    index: usize,
    result: Result<(), UploadError>,
}

/// One pass over the batch, from BATCH_START or RETRY until it settles.
struct Attempt {
    id: u64,
    cancel: CancellationToken,
}

/// A cancelled call that has not reported back yet.
struct Draining {
    attempt_id: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Drives a batch through the transport one file at a time.
pub struct UploadOrchestrator {
    config: OrchestratorConfig,
    transport: Arc<dyn UploadTransport>,
    machine: UploadMachine,
    attempt: Option<Attempt>,
    next_attempt_id: u64,
    in_flight: Option<JoinHandle<()>>,
    draining: Option<Draining>,
    /// First file of a new attempt, held while `draining` winds down.
    held: Option<FileHandle>,
    snapshot_tx: watch::Sender<UploadSnapshot>,
    completion_tx: mpsc::UnboundedSender<Completion>,
}

impl UploadOrchestrator {
    /// Spawn the orchestrator task and return a handle to it.
    ///
    /// Must be called from within a tokio runtime. When `upload_timeout_ms`
    /// is configured the transport is wrapped in a [`TimeoutTransport`].
    pub fn spawn(config: OrchestratorConfig, transport: Arc<dyn UploadTransport>) -> UploadHandle {
        let transport: Arc<dyn UploadTransport> = match config.upload_timeout_ms {
            Some(ms) => Arc::new(TimeoutTransport::new(transport, Duration::from_millis(ms))),
            None => transport,
        };

        let (command_tx, command_rx) = mpsc::channel(config.event_buffer.max(1));
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(UploadSnapshot::default());

        info!("Starting upload orchestrator (transport: {})", transport.name());

        let orchestrator = Self {
            config,
            transport,
            machine: UploadMachine::new(),
            attempt: None,
            next_attempt_id: 0,
            in_flight: None,
            draining: None,
            held: None,
            snapshot_tx,
            completion_tx,
        };

        tokio::spawn(orchestrator.run(command_rx, completion_rx));

        UploadHandle {
            command_tx,
            snapshot_rx,
        }
    }

    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut completion_rx: mpsc::UnboundedReceiver<Completion>,
    ) {
        loop {
            // Commands first: a CANCEL queued alongside a result takes precedence.
            tokio::select! {
                biased;
                command = command_rx.recv() => match command {
                    Some(Command::Event { event, reply }) => {
                        let result = self.handle_event(event);
                        let _ = reply.send(result);
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(completion) = completion_rx.recv() => {
                    self.handle_completion(completion);
                }
            }
        }

        if let Some(attempt) = self.attempt.take() {
            attempt.cancel.cancel();
        }
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        if let Some(draining) = self.draining.take() {
            draining.cancel.cancel();
            draining.task.abort();
        }
        info!("Upload orchestrator stopped");
    }

    fn handle_event(&mut self, event: UploadEvent) -> Result<UploadSnapshot, OrchestratorError> {
        let kind = event.kind();
        match self.machine.apply(event) {
            Ok(effect) => {
                if let Some(effect) = effect {
                    self.perform(effect);
                }
                Ok(self.publish())
            }
            Err(e) => {
                warn!("Rejected {} event: {}", kind, e);
                Err(e)
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        if self
            .draining
            .as_ref()
            .is_some_and(|d| d.attempt_id == completion.attempt_id)
        {
            self.finish_draining();
            return;
        }

        let current = self.attempt.as_ref().map(|a| a.id);
        if current != Some(completion.attempt_id)
            || self.machine.current_file_index() != Some(completion.index)
        {
            debug!(
                "Discarding result for file {} of attempt {} (current attempt: {:?})",
                completion.index + 1,
                completion.attempt_id,
                current
            );
            return;
        }

        self.in_flight = None;

        let outcome = match completion.result {
            Ok(()) => self.machine.on_upload_succeeded(),
            Err(error) => self.machine.on_upload_failed(error).map(|()| None),
        };

        match outcome {
            Ok(Some(effect)) => self.perform(effect),
            Ok(None) => {}
            Err(e) => {
                // Settled before the result arrived (e.g. cancelled).
                debug!("Discarding upload result: {}", e);
                return;
            }
        }

        if self.machine.state().is_settled() {
            self.attempt = None;
        }
        self.publish();
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::StartAttempt { file } => {
                if let Some(stale) = self.attempt.take() {
                    stale.cancel.cancel();
                }
                self.next_attempt_id += 1;
                let attempt = Attempt {
                    id: self.next_attempt_id,
                    cancel: CancellationToken::new(),
                };
                debug!("Opened upload attempt {}", attempt.id);
                self.attempt = Some(attempt);

                match self.draining.as_ref() {
                    Some(draining) if !draining.task.is_finished() => {
                        // At most one call outstanding. Hold file 0 until the old one returns.
                        draining.cancel.cancel();
                        debug!(
                            "Holding {} until attempt {} winds down",
                            file.name, draining.attempt_id
                        );
                        self.held = Some(file);
                    }
                    _ => {
                        self.draining = None;
                        self.dispatch(0, file);
                    }
                }
            }
            Effect::DispatchNext { index, file } => self.dispatch(index, file),
            Effect::SignalCancel => {
                self.held = None;
                if let Some(attempt) = self.attempt.take() {
                    if let Some(task) = self.in_flight.take() {
                        self.draining = Some(Draining {
                            attempt_id: attempt.id,
                            cancel: attempt.cancel.clone(),
                            task,
                        });
                    }
                    self.signal_cancel(attempt.cancel);
                }
            }
        }
    }

    fn finish_draining(&mut self) {
        if let Some(draining) = self.draining.take() {
            debug!("Attempt {} wound down", draining.attempt_id);
        }
        let Some(file) = self.held.take() else {
            return;
        };
        if self.machine.state() == UploadState::UploadingFile
            && self.machine.current_file_index() == Some(0)
        {
            self.dispatch(0, file);
        }
    }

    fn dispatch(&mut self, index: usize, file: FileHandle) {
        let Some(attempt) = self.attempt.as_ref() else {
            warn!("No open attempt for file {}", file.name);
            return;
        };

        let attempt_id = attempt.id;
        let cancel = attempt.cancel.clone();
        let transport = Arc::clone(&self.transport);
        let completion_tx = self.completion_tx.clone();

        debug!(
            "Uploading file {} ({}) in attempt {}",
            index + 1,
            file.name,
            attempt_id
        );

        self.in_flight = Some(tokio::spawn(async move {
            let result = transport.upload(&file, &cancel).await;
            let _ = completion_tx.send(Completion {
                attempt_id,
                index,
                result,
            });
        }));
    }

    fn signal_cancel(&self, token: CancellationToken) {
        let delay = self.config.cancel_signal_delay_ms;
        if delay == 0 {
            token.cancel();
            return;
        }
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            token.cancel();
        });
    }

    fn publish(&self) -> UploadSnapshot {
        let snapshot = self.machine.snapshot();
        self.snapshot_tx.send_replace(snapshot.clone());
        snapshot
    }
}

/// Cloneable handle for sending events and reading snapshots.
#[derive(Clone)]
pub struct UploadHandle {
    command_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<UploadSnapshot>,
}

impl UploadHandle {
    /// Send an event and wait for the snapshot produced by its transition.
    pub async fn send(&self, event: UploadEvent) -> Result<UploadSnapshot, OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Event { event, reply })
            .await
            .map_err(|_| OrchestratorError::Closed)?;
        rx.await.map_err(|_| OrchestratorError::Closed)?
    }

    pub async fn start_batch(
        &self,
        files: Vec<FileHandle>,
    ) -> Result<UploadSnapshot, OrchestratorError> {
        self.send(UploadEvent::BatchStart { files }).await
    }

    pub async fn cancel(&self) -> Result<UploadSnapshot, OrchestratorError> {
        self.send(UploadEvent::Cancel).await
    }

    pub async fn retry(&self) -> Result<UploadSnapshot, OrchestratorError> {
        self.send(UploadEvent::Retry).await
    }

    pub async fn reset(&self) -> Result<UploadSnapshot, OrchestratorError> {
        self.send(UploadEvent::Reset).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> UploadSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<UploadSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// Only the latest snapshot is observed, so short-lived intermediate
    /// snapshots may be skipped.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<UploadSnapshot, OrchestratorError>
    where
        F: FnMut(&UploadSnapshot) -> bool,
    {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| OrchestratorError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Wait until the batch is completed, failed or cancelled.
    pub async fn wait_until_settled(&self) -> Result<UploadSnapshot, OrchestratorError> {
        self.wait_for(|s| s.state.is_settled()).await
    }

    /// Stop the orchestrator, cancelling any upload in flight.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
    }
}
