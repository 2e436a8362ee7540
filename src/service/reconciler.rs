//! Bid State Reconciler
//!
//! The merge engine behind the local auction view, and the validation gate
//! in front of outbound bid submissions. Inbound events arrive on the
//! session queue (one producer: the Connection Manager); submissions may
//! come from any thread, so the shared state sits behind a lock.

use std::str::FromStr;
use std::sync::{
    mpsc::{Receiver, RecvTimeoutError},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Result};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::connection::{NotConnected, SharedAuctionChannel};
use super::LoopService;
use crate::auction::{Amount, AuctionState};
use crate::event::{ConnectionEvent, Event};
use crate::protocol::{ClientMessage, ServerMessage, Snapshot};

/// The last transmitted submission still awaiting server confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSubmission {
    pub token: String,
    pub bidder: String,
    pub amount: Amount,
}

/// Everything the presentation layer reads, kept consistent under one lock.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct BidState {
    pub auction: AuctionState,
    /// Why the last local action was rejected, or what the server last
    /// complained about. Overwritten or cleared by the next action.
    pub validation_error: Option<String>,
    pub pending: Option<PendingSubmission>,
}

pub type SharedBidState = Arc<RwLock<BidState>>;

pub fn new_shared_state() -> SharedBidState {
    Arc::new(RwLock::new(BidState::default()))
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Bidder name is required")]
    BidderRequired,
    #[error("Invalid bid amount")]
    InvalidAmount,
    #[error("Bid amount must be greater than 0")]
    NonPositiveAmount,
    #[error("Bid must be higher than current highest bid (${0:.2})")]
    TooLow(Amount),
    #[error(transparent)]
    NotConnected(#[from] NotConnected),
    #[error("failed to encode bid: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The single consumer of the session event queue.
pub struct Reconciler {
    state: SharedBidState,
    channel: SharedAuctionChannel,
    events: Receiver<Event>,
}

impl Reconciler {
    pub fn new(state: SharedBidState, channel: SharedAuctionChannel, events: Receiver<Event>) -> Self {
        Self {
            state,
            channel,
            events,
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        // A superseded channel must never mutate state; this is what keeps
        // the last events of a dead connection from racing the snapshot of
        // the next one.
        if !self.channel.is_current(event.generation) {
            debug!(generation = event.generation, "discarding stale channel event");
            return;
        }

        match event.details {
            ConnectionEvent::Open => debug!("channel open, awaiting snapshot"),
            ConnectionEvent::Closed => debug!("channel closed"),
            ConnectionEvent::Error(e) => warn!(error = %e, "channel error"),
            ConnectionEvent::Message(raw) => match serde_json::from_str(&raw) {
                Ok(message) => self.apply_message(message),
                Err(e) => warn!(error = %e, "dropping malformed payload"),
            },
        }
    }

    fn apply_message(&mut self, message: ServerMessage) {
        let mut state = self.state.write();
        match message {
            ServerMessage::InitialState { data } => {
                let Snapshot {
                    highest_bid,
                    history,
                } = data;
                state.auction.reset(
                    highest_bid.and_then(|bid| bid.into_confirmed()),
                    history
                        .into_iter()
                        .filter_map(|bid| bid.into_confirmed())
                        .collect(),
                );
                debug!(
                    history_len = state.auction.history_len(),
                    "resynchronized from snapshot"
                );
            }
            ServerMessage::NewBid { data } => {
                if let Some(bid) = data.into_confirmed() {
                    state.auction.apply_bid(bid);
                } else {
                    warn!("dropping bid without an id");
                }
            }
            ServerMessage::BidAccepted { data } => {
                let token = data.token.clone();
                if let Some(bid) = data.into_confirmed() {
                    state.auction.apply_bid(bid);
                } else {
                    warn!("dropping accepted bid without an id");
                }
                // Only the true submitter resets its input: the server
                // echoes back the token we put on the wire.
                let ours = matches!(
                    (&state.pending, &token),
                    (Some(pending), Some(token)) if pending.token == *token
                );
                if ours {
                    state.pending = None;
                    state.validation_error = None;
                }
            }
            ServerMessage::Error { message } => {
                state.validation_error = Some(message);
            }
            ServerMessage::Unknown => debug!("ignoring unknown event type"),
        }
    }
}

impl LoopService for Reconciler {
    fn run_iteration(&mut self) -> Result<()> {
        match self.events.recv_timeout(Duration::from_secs(1)) {
            Ok(event) => {
                self.handle_event(event);
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => bail!("session event queue closed"),
        }
    }
}

/// Outbound gate, callable from any thread.
#[derive(Clone)]
pub struct SubmitHandle {
    state: SharedBidState,
    channel: SharedAuctionChannel,
}

impl SubmitHandle {
    pub fn new(state: SharedBidState, channel: SharedAuctionChannel) -> Self {
        Self { state, channel }
    }

    /// Validate and transmit a bid proposal.
    ///
    /// On rejection nothing is transmitted and the reason is both returned
    /// and stored as the current validation error. On success the bid does
    /// not enter local state; it only comes back through the stream once
    /// the server confirms it.
    pub fn submit(&self, bidder: &str, amount_text: &str) -> Result<(), SubmitError> {
        let mut state = self.state.write();
        state.validation_error = None;

        match self.validate_and_send(&mut state, bidder, amount_text) {
            Ok(()) => Ok(()),
            Err(e) => {
                state.validation_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn validate_and_send(
        &self,
        state: &mut BidState,
        bidder: &str,
        amount_text: &str,
    ) -> Result<(), SubmitError> {
        let bidder = bidder.trim();
        if bidder.is_empty() {
            return Err(SubmitError::BidderRequired);
        }

        let amount =
            Amount::from_str(amount_text.trim()).map_err(|_| SubmitError::InvalidAmount)?;
        if amount <= Amount::ZERO {
            return Err(SubmitError::NonPositiveAmount);
        }

        if state.auction.highest_bid().is_some() && amount <= state.auction.highest_amount() {
            return Err(SubmitError::TooLow(state.auction.highest_amount()));
        }

        if !self.channel.state().is_connected() {
            return Err(NotConnected.into());
        }

        let token = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(&ClientMessage::SubmitBid {
            bidder: bidder.to_owned(),
            amount,
            token: token.clone(),
        })?;
        self.channel.send(payload)?;

        state.pending = Some(PendingSubmission {
            token,
            bidder: bidder.to_owned(),
            amount,
        });
        Ok(())
    }
}
