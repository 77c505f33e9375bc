//! Poll scheduling
//!
//! Status checks of polling-style providers are delayed continuations: an
//! executor schedules a [`PollCheck`] to run after the poll interval and the
//! [`PollWorker`] runs it when it comes due. Nothing is ever cancelled; a
//! check whose attempt has been superseded finds a token mismatch and stops.

use montage_core::domain::execution::ExecutionToken;
use montage_core::domain::executor::ExecutorType;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::executor::Dispatcher;

/// One pending status query for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollCheck {
    pub node_id: Uuid,
    pub token: ExecutionToken,
    pub executor_type: ExecutorType,
    pub provider_job_id: String,
    /// 1-based
    pub attempt: u32,
}

impl PollCheck {
    pub fn next(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

pub trait Scheduler: Send + Sync {
    fn schedule(&self, after: Duration, check: PollCheck);
}

/// Delivers checks on an mpsc channel once their delay has elapsed
#[derive(Debug, Clone)]
pub struct ChannelScheduler {
    tx: mpsc::UnboundedSender<PollCheck>,
}

impl ChannelScheduler {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PollCheck>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Scheduler for ChannelScheduler {
    fn schedule(&self, after: Duration, check: PollCheck) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Err(e) = tx.send(check) {
                warn!(
                    "Poll worker gone, dropping check for node {} (attempt {})",
                    e.0.node_id, e.0.attempt
                );
            }
        });
    }
}

/// Runs due poll checks, at most `max_parallel` at a time
pub struct PollWorker {
    rx: mpsc::UnboundedReceiver<PollCheck>,
    dispatcher: Arc<Dispatcher>,
    semaphore: Arc<Semaphore>,
}

impl PollWorker {
    pub fn new(
        rx: mpsc::UnboundedReceiver<PollCheck>,
        dispatcher: Arc<Dispatcher>,
        max_parallel: usize,
    ) -> Self {
        Self {
            rx,
            dispatcher,
            semaphore: Arc::new(Semaphore::new(max_parallel)),
        }
    }

    /// Process checks for as long as the channel stays open
    pub async fn run(mut self) {
        info!("Starting poll worker");

        while let Some(check) = self.rx.recv().await {
            let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                break;
            };

            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                let node_id = check.node_id;
                let attempt = check.attempt;
                match dispatcher.check(check).await {
                    Ok(outcome) => {
                        debug!("Poll check {} for node {}: {:?}", attempt, node_id, outcome)
                    }
                    Err(e) => error!("Poll check {} for node {} failed: {}", attempt, node_id, e),
                }
                drop(permit);
            });
        }

        info!("Poll worker stopped");
    }
}
