//! Events flowing through the session queue.
//!
//! The Connection Manager is the only producer, the Reconciler the only
//! consumer; every state mutation of the session goes through this queue or
//! the submission gate, nothing else.

/// Monotonically increasing connection generation.
///
/// Every connection attempt gets a fresh generation. Events are tagged with
/// the generation that produced them so that callbacks from a superseded
/// channel can be detected and discarded instead of mutating state.
pub type Generation = u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Channel established.
    Open,
    /// One raw text frame from the server.
    Message(String),
    /// Transport-level failure; the channel closes right after.
    Error(String),
    /// Channel gone; a reconnect will be scheduled.
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub generation: Generation,
    pub details: ConnectionEvent,
}
