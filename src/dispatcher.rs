//! Command dispatcher.
//!
//! Discrete commands are pushed onto a shared FIFO by the control tick and
//! drained by a single consumer task, which sends one command at a time and
//! waits for its reply before looking at the queue again.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::link::VehicleLink;

/// FIFO of pending discrete commands shared with the consumer task.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<VecDeque<Command>>>,
}

impl CommandQueue {
    pub fn push(&self, cmd: Command) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(cmd);
    }

    pub fn pop(&self) -> Option<Command> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Command> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    failed: AtomicU64,
}

struct Worker {
    handle: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
}

pub struct CommandDispatcher {
    queue: CommandQueue,
    interval: Duration,
    counters: Arc<Counters>,
    worker: Option<Worker>,
}

impl CommandDispatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            queue: CommandQueue::default(),
            interval,
            counters: Arc::new(Counters::default()),
            worker: None,
        }
    }

    /// Spawn the consumer task. Only one may run per dispatcher.
    pub fn start<L: VehicleLink>(&mut self, link: Arc<L>) {
        debug_assert!(!self.is_running(), "command dispatcher started twice");
        if self.is_running() {
            warn!("command dispatcher already running");
            return;
        }
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(consume(
            link,
            self.queue.clone(),
            self.interval,
            Arc::clone(&self.counters),
            shutdown_rx,
        ));
        self.worker = Some(Worker {
            handle,
            shutdown_tx,
        });
    }

    /// Append to the tail of the queue. Never blocks on the link.
    pub fn enqueue(&self, cmd: Command) {
        debug!(command = %cmd, "enqueue");
        self.queue.push(cmd);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn sent(&self) -> u64 {
        self.counters.sent.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Stop the consumer after its current send. Pending commands stay
    /// queued.
    pub async fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.shutdown_tx.send(());
            if let Err(e) = worker.handle.await {
                warn!(error = %e, "command dispatcher task failed");
            }
        }
    }
}

async fn consume<L: VehicleLink>(
    link: Arc<L>,
    queue: CommandQueue,
    interval: Duration,
    counters: Arc<Counters>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    info!(interval_ms = interval.as_millis() as u64, "command dispatcher started");

    loop {
        if link.is_closed() {
            info!("vehicle link closed, command dispatcher exiting");
            break;
        }

        if let Some(cmd) = queue.pop() {
            let line = cmd.to_string();
            match link.send(&line).await {
                Ok(reply) => {
                    counters.sent.fetch_add(1, Ordering::Relaxed);
                    debug!(command = %line, reply = %reply, "command sent");
                }
                Err(e) => {
                    // not retried: the next control tick re-evaluates
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(command = %line, error = %e, "command failed");
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown_rx => break,
        }
    }

    info!(
        remaining = queue.len(),
        "command dispatcher stopped"
    );
}
