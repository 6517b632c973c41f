//! Hardware link supervisor.
//!
//! One long-lived task owns the inbound batch queue and the write half of the
//! connection. For every open connection a reader task drains status lines
//! from the device. Failures move the link to `Degraded` and the supervisor
//! reconnects with exponential backoff; callers see failures as errors on
//! their own submission and never as a crash.
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};

use super::reader::read_lines;
use super::types::*;
use crate::serial::protocol::CommandBatch;
use crate::serial::{Result, SerialError};

#[derive(Clone)]
pub struct LinkHandle {
    request_tx: mpsc::Sender<LinkRequest>,
    lines_tx: broadcast::Sender<String>,
    state_rx: watch::Receiver<LinkState>,
    metrics_rx: watch::Receiver<LinkMetrics>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    supervisor: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl LinkHandle {
    /// Queue a batch and wait until it has been written out in full.
    ///
    /// The queue is bounded, so this suspends until the supervisor can take
    /// the batch. Batches are transmitted in the order they reach the queue
    /// and never interleave.
    pub async fn submit(&self, batch: CommandBatch) -> Result<DeliveryReceipt> {
        if batch.is_empty() {
            return Err(SerialError::ProtocolError("Refusing to send an empty batch".into()));
        }
        let (responder, rx) = oneshot::channel();
        self.request_tx
            .send(LinkRequest { batch, responder })
            .await
            .map_err(|_| SerialError::LinkClosed)?;
        rx.await.map_err(|_| SerialError::LinkClosed)?
    }

    pub fn state(&self) -> LinkState {
        self.state_rx.borrow().clone()
    }

    pub fn state_receiver(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    /// Wait until the link reaches a state matching `predicate`.
    pub async fn wait_for_state<F>(&self, predicate: F) -> Result<LinkState>
    where
        F: FnMut(&LinkState) -> bool,
    {
        let mut rx = self.state_rx.clone();
        let state = rx.wait_for(predicate).await.map_err(|_| SerialError::LinkClosed)?;
        Ok(state.clone())
    }

    pub fn metrics(&self) -> LinkMetrics {
        self.metrics_rx.borrow().clone()
    }

    pub fn metrics_receiver(&self) -> watch::Receiver<LinkMetrics> {
        self.metrics_rx.clone()
    }

    /// Inbound device lines, already stripped of their terminators.
    pub fn subscribe_lines(&self) -> broadcast::Receiver<String> {
        self.lines_tx.subscribe()
    }

    /// Signal shutdown and wait for the supervisor to finish. A batch already
    /// on the wire is completed first; queued batches fail with `LinkClosed`.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let task = self.supervisor.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                log::error!("Hardware link supervisor ended abnormally: {}", e);
            }
        }
    }
}

pub struct LinkBuilder<C> {
    connector: C,
    config: LinkConfig,
}

impl<C: LinkConnector> LinkBuilder<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            config: LinkConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Spawn the supervisor on the current tokio runtime.
    pub fn build(self) -> LinkHandle {
        let (request_tx, request_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let (lines_tx, _lines_rx) = broadcast::channel(self.config.line_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(LinkState::Closed);
        let (metrics_tx, metrics_rx) = watch::channel(LinkMetrics::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let supervisor = Supervisor {
            connector: self.connector,
            config: self.config,
            request_rx,
            shutdown_rx,
            state_tx,
            metrics_tx: Arc::new(metrics_tx),
            lines_tx: lines_tx.clone(),
        };
        let task = tokio::spawn(supervisor.run());

        LinkHandle {
            request_tx,
            lines_tx,
            state_rx,
            metrics_rx,
            shutdown_tx: Arc::new(shutdown_tx),
            supervisor: Arc::new(Mutex::new(Some(task))),
        }
    }
}

enum SessionEnd {
    Shutdown,
    Failed(String),
}

struct Supervisor<C> {
    connector: C,
    config: LinkConfig,
    request_rx: mpsc::Receiver<LinkRequest>,
    shutdown_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<LinkState>,
    metrics_tx: Arc<watch::Sender<LinkMetrics>>,
    lines_tx: broadcast::Sender<String>,
}

impl<C: LinkConnector> Supervisor<C> {
    async fn run(mut self) {
        let target = self.connector.describe();
        let mut backoff = Backoff::new(self.config.reconnect_initial, self.config.reconnect_max);
        let mut failed_connects = 0u32;

        loop {
            log::info!("Opening hardware link on {}", target);
            let connected = tokio::select! {
                res = self.connector.connect() => res,
                _ = shutdown_signalled(&mut self.shutdown_rx) => break,
            };

            let reason = match connected {
                Ok(io) => {
                    backoff.reset();
                    failed_connects = 0;
                    self.state_tx.send_replace(LinkState::Open);
                    log::info!("Hardware link open on {}", target);
                    match self.run_session(io).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Failed(reason) => reason,
                    }
                }
                Err(e) => {
                    failed_connects += 1;
                    let reason = format!("connect failed: {}", e);
                    if let Some(max) = self.config.max_reconnect_attempts {
                        if failed_connects >= max {
                            log::error!(
                                "Giving up on {} after {} failed connection attempt(s): {}",
                                target,
                                failed_connects,
                                e
                            );
                            self.record_error(&reason);
                            break;
                        }
                    }
                    reason
                }
            };

            self.record_error(&reason);
            self.state_tx.send_replace(LinkState::Degraded { reason: reason.clone() });
            let delay = backoff.next_delay();
            log::warn!("Hardware link degraded ({}); reconnecting in {:?}", reason, delay);

            if !self.wait_degraded(delay, &reason).await {
                break;
            }
            self.metrics_tx.send_modify(|m| m.reconnect_attempts += 1);
        }

        self.close();
    }

    async fn run_session(&mut self, io: LinkIo) -> SessionEnd {
        let LinkIo { reader, mut writer } = io;
        let (failed_tx, mut failed_rx) = oneshot::channel();
        let reader_task = tokio::spawn(read_lines(
            reader,
            self.config.read_idle_timeout,
            self.lines_tx.clone(),
            self.metrics_tx.clone(),
            self.shutdown_rx.clone(),
            failed_tx,
        ));
        let mut pacer = Pacer::new(self.config.command_delay);

        let end = loop {
            tokio::select! {
                biased;
                _ = shutdown_signalled(&mut self.shutdown_rx) => break SessionEnd::Shutdown,
                failure = &mut failed_rx => {
                    break SessionEnd::Failed(failure.unwrap_or_else(|_| "reader task stopped".to_string()));
                }
                request = self.request_rx.recv() => {
                    let Some(LinkRequest { batch, responder }) = request else {
                        break SessionEnd::Shutdown;
                    };
                    match transmit_batch(&mut writer, &batch, &self.config, &mut pacer, &self.metrics_tx).await {
                        Ok(receipt) => {
                            let _ = responder.send(Ok(receipt));
                        }
                        Err(e) => {
                            let reason = e.to_string();
                            let _ = responder.send(Err(e));
                            break SessionEnd::Failed(reason);
                        }
                    }
                }
            }
        };

        reader_task.abort();
        end
    }

    /// Sleep out the backoff delay, refusing any batch that arrives meanwhile.
    /// Returns false when the link should stop instead of reconnecting.
    async fn wait_degraded(&mut self, delay: Duration, reason: &str) -> bool {
        let backoff = tokio::time::sleep(delay);
        tokio::pin!(backoff);

        loop {
            tokio::select! {
                _ = &mut backoff => return true,
                _ = shutdown_signalled(&mut self.shutdown_rx) => return false,
                request = self.request_rx.recv() => match request {
                    Some(LinkRequest { batch, responder }) => {
                        log::warn!("Refusing {} while hardware link is degraded", batch.kind());
                        let _ = responder.send(Err(SerialError::LinkDegraded(reason.to_string())));
                    }
                    None => return false,
                },
            }
        }
    }

    fn record_error(&self, reason: &str) {
        self.metrics_tx.send_modify(|m| m.last_error = Some(reason.to_string()));
    }

    fn close(mut self) {
        self.state_tx.send_replace(LinkState::Closed);
        self.request_rx.close();
        while let Ok(LinkRequest { responder, .. }) = self.request_rx.try_recv() {
            let _ = responder.send(Err(SerialError::LinkClosed));
        }
        log::info!("Hardware link closed");
    }
}

/// Resolves once shutdown has been requested or every handle is gone.
pub(super) async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn transmit_batch<W>(
    writer: &mut W,
    batch: &CommandBatch,
    config: &LinkConfig,
    pacer: &mut Pacer,
    metrics_tx: &watch::Sender<LinkMetrics>,
) -> Result<DeliveryReceipt>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let started = Instant::now();
    log::info!("Transmitting {} as batch {} ({} commands)", batch.kind(), batch.id(), batch.len());

    for (sent, command) in batch.commands().iter().enumerate() {
        pacer.ready().await;
        log::debug!("> {}", command);

        let line = command.to_line();
        let write = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        };
        let failure = match timeout(config.write_timeout, write).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(SerialError::TransmissionFailed {
                batch_id: batch.id(),
                sent,
                reason: e.to_string(),
            }),
            Err(_) => Some(SerialError::WriteTimeout {
                batch_id: batch.id(),
                sent,
                timeout: config.write_timeout,
            }),
        };
        if let Some(e) = failure {
            log::error!("{}", e);
            metrics_tx.send_modify(|m| m.write_failures += 1);
            return Err(e);
        }

        pacer.mark();
        metrics_tx.send_modify(|m| m.lines_written += 1);
    }

    let completed_at = Utc::now();
    metrics_tx.send_modify(|m| {
        m.batches_sent += 1;
        m.last_batch_at = Some(completed_at);
    });

    Ok(DeliveryReceipt {
        batch_id: batch.id(),
        kind: batch.kind(),
        commands: batch.len(),
        elapsed: started.elapsed(),
        completed_at,
    })
}

/// Enforces the minimum gap between consecutive lines, across batches.
struct Pacer {
    delay: Duration,
    last_write: Option<Instant>,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self { delay, last_write: None }
    }

    async fn ready(&self) {
        if let Some(last) = self.last_write {
            sleep_until(last + self.delay).await;
        }
    }

    fn mark(&mut self) {
        self.last_write = Some(Instant::now());
    }
}

struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max, current: initial }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}
