use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::mpsc, task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::network::{Callback, NodeId, Payload, Transport, Value};

/*
    One task per (neighbor, value). Each attempt sends the value as a
    request, then waits up to `attempt × base_delay` for an acknowledgement
    of any attempt so far. The task ends on the first acknowledgement, after
    `max_attempts` unanswered sends, or when cancelled.

    Giving up is silent: there is no repair path, the neighbor may never see
    the value. Only `RetryStats::given_up` records it.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_attempts: 100,
        }
    }
}

impl RetryPolicy {
    /// The smallest base delay accepted, so waits keep growing per attempt.
    pub const MIN_BASE_DELAY: Duration = Duration::from_millis(1);

    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        RetryPolicy {
            base_delay: base_delay.max(Self::MIN_BASE_DELAY),
            max_attempts: max_attempts.max(1),
        }
    }

    /// How long attempt `attempt` (1-based) waits for an acknowledgement.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Acknowledged { attempts: u32 },
    GivenUp { attempts: u32 },
    Cancelled { attempts: u32 },
}

#[derive(Debug, Default)]
pub struct RetryStats {
    spawned: AtomicU64,
    acknowledged: AtomicU64,
    given_up: AtomicU64,
    cancelled: AtomicU64,
}

impl RetryStats {
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    pub fn acknowledged(&self) -> u64 {
        self.acknowledged.load(Ordering::Relaxed)
    }

    pub fn given_up(&self) -> u64 {
        self.given_up.load(Ordering::Relaxed)
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> u64 {
        self.spawned()
            .saturating_sub(self.acknowledged() + self.given_up() + self.cancelled())
    }

    fn record(&self, outcome: RetryOutcome) {
        let counter = match outcome {
            RetryOutcome::Acknowledged { .. } => &self.acknowledged,
            RetryOutcome::GivenUp { .. } => &self.given_up,
            RetryOutcome::Cancelled { .. } => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct RetryTask<T: Transport> {
    pub transport: Arc<T>,
    pub dest: NodeId,
    pub value: Value,
    pub policy: RetryPolicy,
    pub cancel: CancellationToken,
}

impl<T: Transport> RetryTask<T> {
    pub fn new(
        transport: Arc<T>,
        dest: NodeId,
        value: Value,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        RetryTask {
            transport,
            dest,
            value,
            policy,
            cancel,
        }
    }

    pub fn spawn(self, stats: Arc<RetryStats>) -> JoinHandle<RetryOutcome> {
        stats.spawned.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            let outcome = self.run().await;
            stats.record(outcome);
            outcome
        })
    }

    pub async fn run(self) -> RetryOutcome {
        let mut outstanding = Vec::with_capacity(self.policy.max_attempts as usize);
        let outcome = self.deliver(&mut outstanding).await;

        // Whatever the outcome, no attempt's callback may outlive the task
        for msg_id in outstanding {
            self.transport.forget(msg_id);
        }
        outcome
    }

    async fn deliver(&self, outstanding: &mut Vec<u64>) -> RetryOutcome {
        // Shared by every attempt's callback, so a late ack still counts
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel::<()>();

        for attempt in 1..=self.policy.max_attempts {
            if self.cancel.is_cancelled() {
                return RetryOutcome::Cancelled { attempts: attempt - 1 };
            }

            let ack_tx = ack_tx.clone();
            let callback: Callback = Box::new(move |_| {
                let _ = ack_tx.send(());
            });
            let payload = Payload::Broadcast { message: self.value };
            match self.transport.request(&self.dest, payload, callback) {
                Ok(msg_id) => outstanding.push(msg_id),
                Err(e) => {
                    debug!(dest = %self.dest, value = self.value, attempt, error = %e, "gossip send failed")
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
                acked = timeout(self.policy.backoff(attempt), ack_rx.recv()) => {
                    if let Ok(Some(())) = acked {
                        trace!(dest = %self.dest, value = self.value, attempt, "gossip acknowledged");
                        return RetryOutcome::Acknowledged { attempts: attempt };
                    }
                }
            }
        }

        trace!(dest = %self.dest, value = self.value, "gossip retries exhausted");
        RetryOutcome::GivenUp {
            attempts: self.policy.max_attempts,
        }
    }
}
