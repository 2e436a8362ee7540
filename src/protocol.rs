//! JSON wire envelope spoken over the bid stream.
//!
//! Everything inbound is optional-by-default: the server's snapshot uses a
//! zero-amount null-bid sentinel for "no highest bid yet", and the stream
//! may carry event types this client does not know about.

use serde::{Deserialize, Serialize};

use crate::auction::{Amount, Bid};

/// A bid as it appears on the wire. All fields may be absent.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct WireBid {
    #[serde(default)]
    pub bid_id: Option<String>,
    #[serde(default)]
    pub bidder: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Amount>,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Correlation token echoed back from `submit_bid`, if the server
    /// supports it. Only meaningful on `bid_accepted`.
    #[serde(default)]
    pub token: Option<String>,
}

impl WireBid {
    /// Convert to a confirmed domain bid.
    ///
    /// Returns `None` unless `bid_id` is present and non-empty, which is
    /// what separates a real confirmed bid from the snapshot sentinel.
    pub fn into_confirmed(self) -> Option<Bid> {
        let id = self.bid_id.filter(|id| !id.is_empty())?;
        Some(Bid {
            id,
            bidder: self.bidder.unwrap_or_default(),
            amount: self.amount.unwrap_or_default(),
            timestamp: self.timestamp,
        })
    }
}

/// The snapshot payload of `initial_state`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub highest_bid: Option<WireBid>,
    #[serde(default)]
    pub history: Vec<WireBid>,
}

/// Server-to-client messages.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "initial_state")]
    InitialState {
        #[serde(default)]
        data: Snapshot,
    },
    #[serde(rename = "new_bid")]
    NewBid { data: WireBid },
    #[serde(rename = "bid_accepted")]
    BidAccepted { data: WireBid },
    #[serde(rename = "error")]
    Error { message: String },
    /// Any event type we do not understand. Ignored.
    #[serde(other)]
    Unknown,
}

/// Client-to-server messages.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "submit_bid")]
    SubmitBid {
        bidder: String,
        #[serde(with = "rust_decimal::serde::float")]
        amount: Amount,
        /// Client-generated correlation token; the server echoes it back on
        /// the matching `bid_accepted` so only the true submitter clears its
        /// pending input.
        token: String,
    },
}
