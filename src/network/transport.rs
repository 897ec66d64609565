use super::message::{Message, Payload};
use crate::common::Result;

/// Invoked at most once with the response correlated to a request.
pub type Callback = Box<dyn FnOnce(Message) + Send + 'static>;

/// The messaging primitives the broadcast core relies on.
///
/// Framing, `msg_id` allocation and response correlation all live behind
/// this trait. None of the methods block: they hand the message off and
/// return.
pub trait Transport: Send + Sync + 'static {
    /// This node's identifier, empty until the cluster has initialised it.
    fn node_id(&self) -> &str;

    /// Fire-and-forget delivery, no response expected.
    fn send(&self, dest: &str, payload: Payload) -> Result<()>;

    /// Sends `payload` and registers `callback` for the correlated response,
    /// returning the request's `msg_id`. Nothing fires if no response ever
    /// arrives.
    fn request(&self, dest: &str, payload: Payload, callback: Callback) -> Result<u64>;

    /// Drops the callback of an unanswered request. A response arriving
    /// afterwards is ignored.
    fn forget(&self, msg_id: u64);

    /// Sends a response correlated to `request`.
    fn reply(&self, request: &Message, payload: Payload) -> Result<()>;
}
