mod auction;
mod config;
mod event;
mod protocol;
mod service;
mod session;

use std::sync::mpsc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env();
    info!(endpoint = %config.endpoint, "starting bidding session");
    let session = session::Session::start(&config)?;

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        eprintln!("Stopping session...");
        let _ = stop_tx.send(());
    })?;

    let mut last = session.view();
    loop {
        match stop_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
        if !session.is_running() {
            break;
        }

        let view = session.view();
        if view.connection != last.connection {
            info!(state = ?view.connection, "connection state changed");
        }
        if view.highest_bid != last.highest_bid {
            if let Some(bid) = &view.highest_bid {
                info!(
                    bidder = %bid.bidder,
                    amount = %auction::format_amount(bid.amount),
                    "new highest bid"
                );
            }
        }
        if view.validation_error != last.validation_error {
            if let Some(error) = &view.validation_error {
                info!(%error, "bid rejected");
            }
        }
        last = view;
    }

    session.shutdown()
}
