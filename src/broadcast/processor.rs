use std::sync::Arc;

use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::{
    retry::{RetryPolicy, RetryStats, RetryTask},
    store::DeliveredStore,
    topology::Topology,
};
use crate::{
    common::{GossipError, Result},
    network::{Message, Payload, TopologyMap, Transport, Value},
};

/*
    Inbound requests are handled one at a time off the inbox. No handler
    waits on the network: fanout spawns one retry task per neighbor and
    returns, so a client's `broadcast_ok` never waits on gossip.

    Nothing bounds the number of outstanding retry tasks. A burst of N new
    values on a node with M neighbors runs up to N × M tasks at once.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutPolicy {
    /// Skip the peer a value was received from.
    pub exclude_origin: bool,
}

impl Default for FanoutPolicy {
    fn default() -> Self {
        FanoutPolicy {
            exclude_origin: true,
        }
    }
}

pub struct BroadcastProcessor<T: Transport> {
    pub transport: Arc<T>,
    pub store: DeliveredStore,
    pub topology: Topology,
    pub stats: Arc<RetryStats>,
    pub retry: RetryPolicy,
    pub fanout: FanoutPolicy,
    pub cancel: CancellationToken,
    pub msg_rx: Receiver<Message>,
}

impl<T: Transport> BroadcastProcessor<T> {
    pub fn new(
        transport: Arc<T>,
        retry: RetryPolicy,
        fanout: FanoutPolicy,
        cancel: CancellationToken,
        msg_rx: Receiver<Message>,
    ) -> Self {
        BroadcastProcessor {
            transport,
            store: DeliveredStore::new(),
            topology: Topology::new(),
            stats: Arc::new(RetryStats::default()),
            retry,
            fanout,
            cancel,
            msg_rx,
        }
    }

    pub async fn run(&mut self) {
        info!(retry = ?self.retry, fanout = ?self.fanout, "running broadcast processor");
        while let Some(message) = self.msg_rx.recv().await {
            if let Err(e) = self.handle(&message) {
                warn!(src = %message.src, kind = message.body.payload.kind(), error = %e, "handler failed");
                let payload = Payload::Error {
                    code: e.code(),
                    text: e.to_string(),
                };
                if let Err(e) = self.respond(&message, payload) {
                    warn!(error = %e, "could not send error reply");
                }
            }
        }
        info!(
            delivered = self.store.len(),
            spawned = self.stats.spawned(),
            acknowledged = self.stats.acknowledged(),
            given_up = self.stats.given_up(),
            "broadcast processor stopped"
        );
    }

    pub fn handle(&self, message: &Message) -> Result<()> {
        match &message.body.payload {
            Payload::Broadcast { message: value } => self.handle_broadcast(message, *value),
            Payload::Read => self.handle_read(message),
            Payload::Topology { topology } => self.handle_topology(message, topology.clone()),
            Payload::Generate => self.handle_generate(message),
            Payload::BroadcastOk
            | Payload::ReadOk { .. }
            | Payload::TopologyOk
            | Payload::GenerateOk { .. }
            | Payload::InitOk
            | Payload::Error { .. } => {
                debug!(src = %message.src, kind = message.body.payload.kind(), "ignoring unsolicited response");
                Ok(())
            }
            Payload::Init { .. } => Err(GossipError::NotSupported("init".to_string())),
        }
    }

    /// Acknowledges first, then delivers and gossips the value if it is new.
    fn handle_broadcast(&self, request: &Message, value: Value) -> Result<()> {
        if let Err(e) = self.respond(request, Payload::BroadcastOk) {
            warn!(src = %request.src, error = %e, "could not acknowledge broadcast");
        }

        if !self.store.insert(value) {
            trace!(value, src = %request.src, "already delivered");
            return Ok(());
        }

        let spawned = self.spawn_fanout(value, &request.src);
        debug!(value, src = %request.src, spawned, "delivered new value");
        Ok(())
    }

    fn handle_read(&self, request: &Message) -> Result<()> {
        let messages = self.store.snapshot();
        self.respond(request, Payload::ReadOk { messages })
    }

    fn handle_topology(&self, request: &Message, topology: TopologyMap) -> Result<()> {
        let generation = self.topology.replace(topology);
        let neighbors = self.topology.neighbors(self.transport.node_id());
        info!(generation, ?neighbors, "topology replaced");
        self.respond(request, Payload::TopologyOk)
    }

    fn handle_generate(&self, request: &Message) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        self.respond(request, Payload::GenerateOk { id })
    }

    /// Spawns one retry task per current neighbor and returns how many.
    fn spawn_fanout(&self, value: Value, origin: &str) -> usize {
        let mut spawned = 0;
        for neighbor in self.topology.neighbors(self.transport.node_id()) {
            if self.fanout.exclude_origin && neighbor == origin {
                continue;
            }
            RetryTask::new(
                self.transport.clone(),
                neighbor,
                value,
                self.retry,
                self.cancel.child_token(),
            )
            .spawn(self.stats.clone());
            spawned += 1;
        }
        spawned
    }

    /// Replies only to requests; fire-and-forget messages carry no `msg_id`.
    fn respond(&self, request: &Message, payload: Payload) -> Result<()> {
        if request.body.msg_id.is_none() {
            return Ok(());
        }
        self.transport.reply(request, payload)
    }
}
