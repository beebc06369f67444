use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::session::Command;

/// One-shot round countdown. At most one countdown runs at a time; starting
/// a new one or cancelling invalidates any expiry still in flight, so a
/// cancelled round can never fire late.
pub struct RoundTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self {
            generation: 0,
            handle: None,
        }
    }

    /// Start counting down `secs` seconds in 1-second ticks, delivering a
    /// `TimerElapsed` command tagged with the returned generation when the
    /// countdown reaches zero.
    pub fn start(&mut self, secs: u32, tx: mpsc::Sender<Command>) -> u64 {
        self.cancel();
        let generation = self.generation;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately.
            interval.tick().await;
            let mut remaining = secs;
            while remaining > 0 {
                interval.tick().await;
                remaining -= 1;
            }
            let _ = tx.send(Command::TimerElapsed { generation }).await;
        });
        self.handle = Some(handle);
        generation
    }

    /// Stop the countdown. Bumping the generation ensures an expiry already
    /// queued in the session channel is discarded on arrival.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether an expiry belongs to the currently running countdown.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.handle.is_some()
    }
}

impl Default for RoundTimer {
    fn default() -> Self {
        Self::new()
    }
}
