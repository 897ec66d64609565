use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::common::{GossipError, Result};

pub type NodeId = String;

/// An opaque broadcast payload. Only its identity matters to the core.
pub type Value = i64;

pub type TopologyMap = HashMap<NodeId, Vec<NodeId>>;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Message {
    pub src: NodeId,
    pub dest: NodeId,
    pub body: Body,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Body {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,
    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Init {
        node_id: NodeId,
        node_ids: Vec<NodeId>,
    },
    InitOk,
    Broadcast {
        message: Value,
    },
    BroadcastOk,
    Read,
    ReadOk {
        messages: Vec<Value>,
    },
    Topology {
        topology: TopologyMap,
    },
    TopologyOk,
    Generate,
    GenerateOk {
        id: String,
    },
    Error {
        code: u32,
        text: String,
    },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Init { .. } => "init",
            Payload::InitOk => "init_ok",
            Payload::Broadcast { .. } => "broadcast",
            Payload::BroadcastOk => "broadcast_ok",
            Payload::Read => "read",
            Payload::ReadOk { .. } => "read_ok",
            Payload::Topology { .. } => "topology",
            Payload::TopologyOk => "topology_ok",
            Payload::Generate => "generate",
            Payload::GenerateOk { .. } => "generate_ok",
            Payload::Error { .. } => "error",
        }
    }

    /// Whether `kind` is the tag of some variant, i.e. a value `kind()` returns.
    pub fn is_known(kind: &str) -> bool {
        matches!(
            kind,
            "init"
                | "init_ok"
                | "broadcast"
                | "broadcast_ok"
                | "read"
                | "read_ok"
                | "topology"
                | "topology_ok"
                | "generate"
                | "generate_ok"
                | "error"
        )
    }
}

impl Body {
    pub fn new(msg_id: Option<u64>, in_reply_to: Option<u64>, payload: Payload) -> Self {
        Body {
            msg_id,
            in_reply_to,
            payload,
        }
    }
}

/// An inbound envelope whose body has not been decoded yet.
///
/// Decoding is split in two so that a body of the wrong shape can still be
/// answered: the `msg_id` and `type` are read loosely first, the typed
/// payload only afterwards.
#[derive(Deserialize, Debug)]
pub struct RawMessage {
    pub src: NodeId,
    pub dest: NodeId,
    pub body: serde_json::Value,
}

impl RawMessage {
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn kind(&self) -> Option<&str> {
        self.body.get("type").and_then(serde_json::Value::as_str)
    }

    pub fn msg_id(&self) -> Option<u64> {
        self.body.get("msg_id").and_then(serde_json::Value::as_u64)
    }

    pub fn in_reply_to(&self) -> Option<u64> {
        self.body.get("in_reply_to").and_then(serde_json::Value::as_u64)
    }

    pub fn decode(self) -> Result<Message> {
        let kind = match self.kind() {
            Some(kind) => kind.to_string(),
            None => {
                return Err(GossipError::Malformed {
                    kind: "untyped".to_string(),
                    reason: "missing `type` field".to_string(),
                })
            }
        };
        if !Payload::is_known(&kind) {
            return Err(GossipError::NotSupported(kind));
        }

        let body = serde_json::from_value(self.body).map_err(|e| GossipError::Malformed {
            kind,
            reason: e.to_string(),
        })?;

        Ok(Message {
            src: self.src,
            dest: self.dest,
            body,
        })
    }
}
