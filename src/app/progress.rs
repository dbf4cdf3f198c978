use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::report::ProgressSnapshot;
use crate::shutdown::ShutdownSender;

/// How often running counters are logged while a run is in flight.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Logs the reporter's running counters until the reporter stops or a
/// shutdown is signalled.
pub(super) fn setup_progress_logger(
    mut progress_rx: watch::Receiver<ProgressSnapshot>,
    shutdown_tx: &ShutdownSender,
) -> tokio::task::JoinHandle<()> {
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        let mut last = ProgressSnapshot::default();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    if progress_rx.has_changed().is_err() {
                        break;
                    }
                    let snapshot = *progress_rx.borrow_and_update();
                    if snapshot != last {
                        info!(
                            "Progress: {} hits, {} success, {} fails",
                            snapshot.hits, snapshot.successes, snapshot.failures
                        );
                        last = snapshot;
                    }
                }
            }
        }
    })
}
