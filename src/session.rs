//! One bidding session: one channel, one state, one explicit lifecycle.
//!
//! The session object wires the Connection Manager to the Reconciler over
//! the event queue and is what a presentation layer gets injected with.

use std::sync::{mpsc, Arc};

use anyhow::Result;

use crate::auction::Bid;
use crate::config::Config;
use crate::service::connection::{
    AuctionChannel, ConnectionManager, ConnectionState, SharedAuctionChannel,
};
use crate::service::reconciler::{
    self, PendingSubmission, Reconciler, SharedBidState, SubmitError, SubmitHandle,
};
use crate::service::{JoinHandle, ServiceControl};

/// A point-in-time snapshot of everything the presentation layer shows.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionView {
    pub highest_bid: Option<Bid>,
    /// Most-recent-first, at most [`crate::auction::HISTORY_LIMIT`] entries.
    pub history: Vec<Bid>,
    pub connection: ConnectionState,
    pub validation_error: Option<String>,
    pub pending: Option<PendingSubmission>,
}

pub struct Session {
    state: SharedBidState,
    connection: Arc<ConnectionManager>,
    submitter: SubmitHandle,
    svc_ctl: ServiceControl,
    reconciler: Option<JoinHandle>,
}

impl Session {
    pub fn start(config: &Config) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::channel();

        let connection = Arc::new(ConnectionManager::spawn(config, events_tx)?);
        let channel: SharedAuctionChannel = connection.clone();

        let state = reconciler::new_shared_state();
        let svc_ctl = ServiceControl::new();
        let reconciler =
            svc_ctl.spawn_loop(Reconciler::new(state.clone(), channel.clone(), events_rx));
        let submitter = SubmitHandle::new(state.clone(), channel);

        Ok(Self {
            state,
            connection,
            submitter,
            svc_ctl,
            reconciler: Some(reconciler),
        })
    }

    pub fn view(&self) -> SessionView {
        let state = self.state.read();
        SessionView {
            highest_bid: state.auction.highest_bid().cloned(),
            history: state.auction.history().cloned().collect(),
            connection: self.connection.state(),
            validation_error: state.validation_error.clone(),
            pending: state.pending.clone(),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// False once any background service has failed or the session was
    /// told to stop; the caller should wind down.
    pub fn is_running(&self) -> bool {
        !self.svc_ctl.is_stopped()
    }

    /// Validate and transmit a bid proposal. See [`SubmitHandle::submit`].
    pub fn submit(&self, bidder: &str, amount_text: &str) -> Result<(), SubmitError> {
        self.submitter.submit(bidder, amount_text)
    }

    /// Stop the reconciler, close the channel, cancel reconnection.
    pub fn shutdown(mut self) -> Result<()> {
        self.svc_ctl.stop_all();
        let joined = match self.reconciler.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        };
        self.connection.close();
        joined
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.svc_ctl.stop_all();
        self.connection.close();
        // joins on drop
        self.reconciler.take();
    }
}
