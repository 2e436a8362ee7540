use rust_decimal::Decimal;
use std::collections::VecDeque;

pub type BidId = String;
pub type BidIdRef<'s> = &'s str;
pub type Amount = Decimal;

/// How many bids the history window retains.
pub const HISTORY_LIMIT: usize = 50;

/// A server-confirmed bid.
///
/// Anything stored in [`AuctionState`] went through the server: it always
/// carries a non-empty `id`. Locally typed, not-yet-confirmed input never
/// becomes a `Bid`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bid {
    pub id: BidId,
    pub bidder: String,
    pub amount: Amount,
    /// Server-assigned, treated as opaque text by the client.
    pub timestamp: Option<String>,
}

/// The merged local view of the auction: highest bid plus a bounded,
/// deduplicated, most-recent-first history.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct AuctionState {
    highest_bid: Option<Bid>,
    history: VecDeque<Bid>,
}

impl AuctionState {
    pub fn highest_bid(&self) -> Option<&Bid> {
        self.highest_bid.as_ref()
    }

    /// Current highest amount; an absent highest bid compares as zero.
    pub fn highest_amount(&self) -> Amount {
        self.highest_bid
            .as_ref()
            .map(|bid| bid.amount)
            .unwrap_or_default()
    }

    /// Most-recent-first.
    pub fn history(&self) -> impl Iterator<Item = &Bid> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn contains(&self, id: BidIdRef) -> bool {
        self.history.iter().any(|bid| bid.id == id)
    }

    /// Wholesale replacement from a snapshot. The snapshot is authoritative:
    /// it may lower the highest bid and rewrite the history. Order is kept
    /// as given (the server already sends most-recent-first).
    pub fn reset(&mut self, highest_bid: Option<Bid>, history: Vec<Bid>) {
        self.highest_bid = highest_bid;
        self.history = history.into_iter().collect();
        self.history.truncate(HISTORY_LIMIT);
    }

    /// Merge one confirmed bid into the view.
    ///
    /// The highest bid only ever moves up (strictly greater amount; ties keep
    /// the first observed). The history is idempotent under duplicate
    /// delivery: a `BidId` already present leaves it untouched. Returns
    /// whether the history changed.
    pub fn apply_bid(&mut self, bid: Bid) -> bool {
        if bid.amount > self.highest_amount() {
            self.highest_bid = Some(bid.clone());
        }

        if self.contains(&bid.id) {
            return false;
        }

        self.history.push_front(bid);
        self.history.truncate(HISTORY_LIMIT);
        true
    }
}

/// Fixed two-decimal currency text, e.g. `10.50`.
pub fn format_amount(amount: Amount) -> String {
    format!("{amount:.2}")
}
