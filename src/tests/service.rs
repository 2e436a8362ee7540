use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use serde_json::json;

use super::RecordingChannel;
use crate::event::{ConnectionEvent, Event};
use crate::service::connection::SharedAuctionChannel;
use crate::service::reconciler::{self, Reconciler};
use crate::service::{LoopService, ServiceControl};

/// The reconciler owns the receiving end of the event queue, so it must be
/// spawnable onto a service thread as-is.
#[test]
fn reconciler_runs_on_a_service_thread() -> Result<()> {
    let channel: SharedAuctionChannel = RecordingChannel::connected();
    let (tx, rx) = mpsc::channel();
    let state = reconciler::new_shared_state();

    let svc_ctl = ServiceControl::new();
    let handle = svc_ctl.spawn_loop(Reconciler::new(state.clone(), channel, rx));

    tx.send(Event {
        generation: 1,
        details: ConnectionEvent::Message(
            json!({
                "type": "new_bid",
                "data": {"bid_id": "1", "bidder": "Alice", "amount": 10.0, "timestamp": "t"}
            })
            .to_string(),
        ),
    })?;

    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline && state.read().auction.history_len() == 0 {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(state.read().auction.history_len(), 1);

    // keep `tx` alive so the loop winds down on the stop flag, not on a
    // closed queue
    svc_ctl.stop_all();
    handle.join()?;
    drop(tx);
    Ok(())
}

struct DoomedService;

impl LoopService for DoomedService {
    fn run_iteration(&mut self) -> Result<()> {
        bail!("boom");
    }
}

#[test]
fn failed_service_flags_the_whole_group_stopped() {
    let svc_ctl = ServiceControl::new();
    assert!(!svc_ctl.is_stopped());

    let handle = svc_ctl.spawn_loop(DoomedService);
    assert!(handle.join().is_err());
    assert!(svc_ctl.is_stopped());
}
