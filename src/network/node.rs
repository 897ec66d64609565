use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        OnceLock,
    },
};

use parking_lot::Mutex;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc::{Sender, UnboundedReceiver, UnboundedSender},
};
use tracing::{debug, info, trace, warn};

use super::{
    message::{Body, Message, NodeId, Payload, RawMessage},
    transport::{Callback, Transport},
};
use crate::common::{GossipError, Result};

/// A cluster member speaking newline-delimited JSON.
///
/// The node answers `init` itself, routes responses to the callbacks
/// registered by [`Transport::request`], and forwards every other request
/// to the processor inbox.
pub struct Node {
    id: OnceLock<NodeId>,
    next_msg_id: AtomicU64,
    callbacks: Mutex<HashMap<u64, Callback>>,
    outbound_tx: UnboundedSender<Message>,
}

impl Node {
    pub fn new(outbound_tx: UnboundedSender<Message>) -> Self {
        Node {
            id: OnceLock::new(),
            next_msg_id: AtomicU64::new(1),
            callbacks: Mutex::new(HashMap::new()),
            outbound_tx,
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Reads messages until `reader` is exhausted.
    pub async fn run<R>(&self, reader: R, inbox: Sender<Message>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Err(e) = self.handle_line(line, &inbox).await {
                warn!(error = %e, "dropped inbound message");
            }
        }
        info!(node = self.node_id(), "input closed");
        Ok(())
    }

    async fn handle_line(&self, line: &str, inbox: &Sender<Message>) -> Result<()> {
        let raw = RawMessage::from_line(line)?;

        if let Some(in_reply_to) = raw.in_reply_to() {
            let response = raw.decode()?;
            self.complete(in_reply_to, response);
            return Ok(());
        }

        let src = raw.src.clone();
        let msg_id = raw.msg_id();
        let message = match raw.decode() {
            Ok(message) => message,
            Err(e) => {
                self.reject(&src, msg_id, &e)?;
                return Err(e);
            }
        };

        if let Payload::Init { node_id, node_ids } = &message.body.payload {
            self.init(node_id, node_ids);
            return self.reply(&message, Payload::InitOk);
        }

        if self.id.get().is_none() {
            let e = GossipError::NotInitialised(message.body.payload.kind().to_string());
            self.reject(&src, msg_id, &e)?;
            return Err(e);
        }

        inbox.send(message).await.map_err(|_| GossipError::Closed)
    }

    fn init(&self, node_id: &str, node_ids: &[NodeId]) {
        if self.id.set(node_id.to_string()).is_err() {
            warn!(node_id, "ignoring repeated init");
            return;
        }
        info!(node_id, members = node_ids.len(), "node initialised");
    }

    fn complete(&self, in_reply_to: u64, response: Message) {
        let callback = self.callbacks.lock().remove(&in_reply_to);
        match callback {
            Some(callback) => callback(response),
            None => debug!(in_reply_to, src = %response.src, "no pending request for response"),
        }
    }

    fn reject(&self, dest: &str, msg_id: Option<u64>, error: &GossipError) -> Result<()> {
        if msg_id.is_none() {
            return Ok(());
        }
        let payload = Payload::Error {
            code: error.code(),
            text: error.to_string(),
        };
        self.emit(dest, Body::new(None, msg_id, payload))
    }

    fn emit(&self, dest: &str, body: Body) -> Result<()> {
        let message = Message {
            src: self.node_id().to_string(),
            dest: dest.to_string(),
            body,
        };
        self.outbound_tx.send(message).map_err(|_| GossipError::Closed)
    }

    fn allocate_msg_id(&self) -> u64 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Transport for Node {
    fn node_id(&self) -> &str {
        self.id.get().map(String::as_str).unwrap_or_default()
    }

    fn send(&self, dest: &str, payload: Payload) -> Result<()> {
        self.emit(dest, Body::new(None, None, payload))
    }

    fn request(&self, dest: &str, payload: Payload, callback: Callback) -> Result<u64> {
        let msg_id = self.allocate_msg_id();
        self.callbacks.lock().insert(msg_id, callback);

        if let Err(e) = self.emit(dest, Body::new(Some(msg_id), None, payload)) {
            self.callbacks.lock().remove(&msg_id);
            return Err(e);
        }
        Ok(msg_id)
    }

    fn forget(&self, msg_id: u64) {
        self.callbacks.lock().remove(&msg_id);
    }

    fn reply(&self, request: &Message, payload: Payload) -> Result<()> {
        let body = Body::new(Some(self.allocate_msg_id()), request.body.msg_id, payload);
        self.emit(&request.src, body)
    }
}

/// Writes every outbound message to `writer` as one JSON line.
///
/// Runs until all senders are dropped.
pub async fn write_loop<W>(mut outbound_rx: UnboundedReceiver<Message>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound_rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
        trace!(dest = %message.dest, kind = message.body.payload.kind(), "sent");
    }
    Ok(())
}
