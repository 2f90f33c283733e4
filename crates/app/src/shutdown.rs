//! Cooperative shutdown signal backed by a tokio [`watch`] channel.
//!
//! Every background loop holds a [`Shutdown`] and stops at its next wait
//! point once the [`ShutdownTrigger`] fires.

use tokio::sync::watch;

/// Fires the shutdown signal. Dropping it also counts as shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

/// Cloneable listener handed to every background task.
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

/// Create a linked trigger / listener pair.
#[must_use]
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), Shutdown(rx))
}

impl ShutdownTrigger {
    /// Ask every listener to stop.
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

impl Shutdown {
    /// Whether shutdown was already requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once shutdown is requested.
    pub async fn wait(&mut self) {
        // A dropped trigger means nobody can ever ask us to keep running.
        let _ = self.0.wait_for(|stop| *stop).await;
    }
}
