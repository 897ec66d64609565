pub mod message;
pub mod node;
pub mod transport;

#[cfg(test)]
pub mod mock;

pub use message::*;
pub use node::*;
pub use transport::*;

/*
    Messages are JSON objects, one per line, exchanged over stdin/stdout.
    Delivery between nodes is unreliable and asynchronous: messages may be
    delayed, dropped or arrive out of order. Request/response pairs are
    correlated by `msg_id` and `in_reply_to`, which this module owns so the
    broadcast core never has to.
*/
