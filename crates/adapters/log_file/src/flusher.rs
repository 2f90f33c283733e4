//! Background flush task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use domisafe_app::shutdown::Shutdown;

use crate::store::DailyLogStore;

/// Default interval between two flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Flush `store` every `period`, regardless of how much is buffered.
///
/// Stops on shutdown without a last flush; the daemon does the final
/// flush once every producer has stopped.
pub fn spawn_flusher(
    store: Arc<DailyLogStore>,
    period: Duration,
    mut shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the immediate first tick.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = store.flush_all() {
                        tracing::warn!(error = %err, "periodic log flush failed");
                    }
                }
                () = shutdown.wait() => break,
            }
        }
        tracing::debug!("log flusher stopped");
    })
}
