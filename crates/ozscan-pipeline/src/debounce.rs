//! Debounced scan trigger.
//!
//! A single-slot restartable timer, independent of any particular
//! DOM-change source: every [`poke`](DebouncedTrigger::poke) pushes the
//! deadline out again, so a burst of signals coalesces into one firing.
//! A manual trigger bypasses the debounce entirely.

use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

/// Single-slot restartable debounce timer.
#[derive(Debug)]
pub struct DebouncedTrigger {
    delay: Duration,
    deadline: Mutex<Option<Instant>>,
    notify: Notify,
}

impl DebouncedTrigger {
    /// Create a trigger with the given debounce delay.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Signal activity: (re)start the timer from now.
    pub fn poke(&self) {
        let mut deadline = self.deadline.lock().expect("acquire deadline lock");
        *deadline = Some(Instant::now() + self.delay);
        self.notify.notify_one();
    }

    /// Manual trigger: fire immediately, bypassing the debounce delay.
    pub fn fire_now(&self) {
        let mut deadline = self.deadline.lock().expect("acquire deadline lock");
        *deadline = Some(Instant::now());
        self.notify.notify_one();
    }

    /// Wait until the timer fires.
    ///
    /// Resolves once the current deadline passes without being pushed out
    /// again; consuming the firing clears the slot.
    pub async fn fired(&self) {
        loop {
            let target = *self.deadline.lock().expect("acquire deadline lock");

            match target {
                None => self.notify.notified().await,
                Some(target) => {
                    if Instant::now() >= target {
                        let mut deadline =
                            self.deadline.lock().expect("acquire deadline lock");
                        // A poke may have moved it while we checked
                        if deadline.is_some_and(|current| Instant::now() >= current) {
                            *deadline = None;
                            debug!("debounced trigger fired");
                            return;
                        }
                        continue;
                    }

                    tokio::select! {
                        () = tokio::time::sleep_until(target) => {}
                        () = self.notify.notified() => {}
                    }
                }
            }
        }
    }
}
