use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{
    sync::mpsc::Sender,
    time::{sleep, Duration, Instant},
};

use super::{
    message::{Body, Message, NodeId, Payload},
    transport::{Callback, Transport},
};
use crate::common::Result;

#[derive(Clone, Debug)]
pub struct Sent {
    pub dest: NodeId,
    pub body: Body,
    pub at: Instant,
}

/// In-memory transport that records outbound traffic.
///
/// Requests to a destination are acknowledged on the attempt configured
/// with [`MockTransport::ack_on`]; destinations without a rule never answer.
pub struct MockTransport {
    id: NodeId,
    sent: Mutex<Vec<Sent>>,
    ack_on: Mutex<HashMap<NodeId, usize>>,
    forgotten: Mutex<Vec<u64>>,
    next_msg_id: Mutex<u64>,
}

impl MockTransport {
    pub fn new(id: &str) -> Self {
        MockTransport {
            id: id.to_string(),
            sent: Mutex::new(Vec::new()),
            ack_on: Mutex::new(HashMap::new()),
            forgotten: Mutex::new(Vec::new()),
            next_msg_id: Mutex::new(1),
        }
    }

    /// Acknowledge the `attempt`-th request (1-based) sent to `dest`.
    pub fn ack_on(&self, dest: &str, attempt: usize) {
        self.ack_on.lock().insert(dest.to_string(), attempt);
    }

    /// Every `msg_id` passed to [`Transport::forget`], in call order.
    pub fn forgotten(&self) -> Vec<u64> {
        self.forgotten.lock().clone()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    /// Requests (messages carrying a `msg_id` and no `in_reply_to`) sent to `dest`.
    pub fn requests_to(&self, dest: &str) -> Vec<Sent> {
        self.sent
            .lock()
            .iter()
            .filter(|sent| {
                sent.dest == dest && sent.body.msg_id.is_some() && sent.body.in_reply_to.is_none()
            })
            .cloned()
            .collect()
    }

    pub fn replies(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .iter()
            .filter(|sent| sent.body.in_reply_to.is_some())
            .cloned()
            .collect()
    }

    fn record(&self, dest: &str, body: Body) {
        self.sent.lock().push(Sent {
            dest: dest.to_string(),
            body,
            at: Instant::now(),
        });
    }

    fn allocate_msg_id(&self) -> u64 {
        let mut next = self.next_msg_id.lock();
        let msg_id = *next;
        *next += 1;
        msg_id
    }
}

impl Transport for MockTransport {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn send(&self, dest: &str, payload: Payload) -> Result<()> {
        self.record(dest, Body::new(None, None, payload));
        Ok(())
    }

    fn request(&self, dest: &str, payload: Payload, callback: Callback) -> Result<u64> {
        let msg_id = self.allocate_msg_id();
        self.record(dest, Body::new(Some(msg_id), None, payload));

        let attempt = self.requests_to(dest).len();
        if self.ack_on.lock().get(dest) == Some(&attempt) {
            callback(Message {
                src: dest.to_string(),
                dest: self.id.clone(),
                body: Body::new(None, Some(msg_id), Payload::BroadcastOk),
            });
        }
        Ok(msg_id)
    }

    fn forget(&self, msg_id: u64) {
        self.forgotten.lock().push(msg_id);
    }

    fn reply(&self, request: &Message, payload: Payload) -> Result<()> {
        let body = Body::new(Some(self.allocate_msg_id()), request.body.msg_id, payload);
        self.record(&request.src, body);
        Ok(())
    }
}

/// An in-memory network of processors.
///
/// Node-to-node messages are dropped at random with probability `loss`, and
/// never cross an isolated node. Anything addressed to an id that never
/// joined counts as a client reply and is kept for inspection.
pub struct SimNetwork {
    inboxes: Mutex<HashMap<NodeId, Sender<Message>>>,
    callbacks: Mutex<HashMap<(NodeId, u64), Callback>>,
    isolated: Mutex<HashSet<NodeId>>,
    client_replies: Mutex<Vec<Message>>,
    rng: Mutex<StdRng>,
    loss: f64,
    next_msg_id: AtomicU64,
}

impl SimNetwork {
    pub fn new(loss: f64, seed: u64) -> Arc<Self> {
        Arc::new(SimNetwork {
            inboxes: Mutex::new(HashMap::new()),
            callbacks: Mutex::new(HashMap::new()),
            isolated: Mutex::new(HashSet::new()),
            client_replies: Mutex::new(Vec::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            loss,
            next_msg_id: AtomicU64::new(1),
        })
    }

    pub fn join(self: &Arc<Self>, id: &str, inbox: Sender<Message>) -> Arc<SimTransport> {
        self.inboxes.lock().insert(id.to_string(), inbox);
        Arc::new(SimTransport {
            id: id.to_string(),
            network: self.clone(),
        })
    }

    pub fn isolate(&self, id: &str) {
        self.isolated.lock().insert(id.to_string());
    }

    pub fn heal(&self, id: &str) {
        self.isolated.lock().remove(id);
    }

    /// The reply `src` sent to a client's request `msg_id`, if any.
    pub fn client_reply(&self, src: &str, msg_id: u64) -> Option<Message> {
        self.client_replies
            .lock()
            .iter()
            .find(|reply| reply.src == src && reply.body.in_reply_to == Some(msg_id))
            .cloned()
    }

    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.lock().len()
    }

    fn deliver(&self, message: Message) {
        let inbox = self.inboxes.lock().get(&message.dest).cloned();
        let Some(inbox) = inbox else {
            self.client_replies.lock().push(message);
            return;
        };

        if self.inboxes.lock().contains_key(&message.src) {
            let isolated = self.isolated.lock();
            if isolated.contains(&message.src) || isolated.contains(&message.dest) {
                return;
            }
            drop(isolated);
            if self.rng.lock().gen_bool(self.loss) {
                return;
            }
        }

        match message.body.in_reply_to {
            Some(in_reply_to) => {
                let callback = self.callbacks.lock().remove(&(message.dest.clone(), in_reply_to));
                if let Some(callback) = callback {
                    callback(message);
                }
            }
            None => {
                let _ = inbox.try_send(message);
            }
        }
    }

    fn allocate_msg_id(&self) -> u64 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }
}

pub struct SimTransport {
    id: NodeId,
    network: Arc<SimNetwork>,
}

impl Transport for SimTransport {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn send(&self, dest: &str, payload: Payload) -> Result<()> {
        self.network.deliver(Message {
            src: self.id.clone(),
            dest: dest.to_string(),
            body: Body::new(None, None, payload),
        });
        Ok(())
    }

    fn request(&self, dest: &str, payload: Payload, callback: Callback) -> Result<u64> {
        let msg_id = self.network.allocate_msg_id();
        self.network
            .callbacks
            .lock()
            .insert((self.id.clone(), msg_id), callback);
        self.network.deliver(Message {
            src: self.id.clone(),
            dest: dest.to_string(),
            body: Body::new(Some(msg_id), None, payload),
        });
        Ok(msg_id)
    }

    fn forget(&self, msg_id: u64) {
        self.network.callbacks.lock().remove(&(self.id.clone(), msg_id));
    }

    fn reply(&self, request: &Message, payload: Payload) -> Result<()> {
        let body = Body::new(Some(self.network.allocate_msg_id()), request.body.msg_id, payload);
        self.network.deliver(Message {
            src: self.id.clone(),
            dest: request.src.clone(),
            body,
        });
        Ok(())
    }
}

/// Polls `condition` every millisecond of (usually paused) tokio time.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
