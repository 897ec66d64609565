/*
    A node in a best-effort broadcast cluster. Every node only talks to its
    neighbors over unreliable point-to-point messages, yet a value submitted
    to any node must eventually be observed by every node.

    On receiving a value a node records it once, then gossips it to each of
    its neighbors. Every (neighbor, value) pair is retried with linear
    backoff until the neighbor acknowledges or the attempt budget runs out.
    A neighbor that never acknowledges within the budget may miss the value
    for good: delivery is best-effort, not at-least-once.
*/

pub mod broadcast;
pub mod common;
pub mod network;
pub mod service;
