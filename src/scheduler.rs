//! Render timer.
//!
//! At most one tick is outstanding. A tick is a spawned tokio sleep that posts its
//! [`TickToken`] to the face's event loop when it expires; the task only holds a
//! channel sender, never the engine. Cancelling invalidates the token at once, so
//! a tick that was already in the channel when the face went dormant is rejected
//! by [`TickScheduler::accept`] instead of drawing.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Identifies one scheduled tick; monotonically increasing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickToken(pub u64);

pub struct TickScheduler {
    last_token: u64,
    pending: Option<(TickToken, JoinHandle<()>)>,
    fires: mpsc::UnboundedSender<TickToken>,
}

impl TickScheduler {
    /// Expired ticks are posted to `fires`.
    pub fn new(fires: mpsc::UnboundedSender<TickToken>) -> Self {
        TickScheduler {
            last_token: 0,
            pending: None,
            fires,
        }
    }

    /// Schedule a tick `delay_ms` from now, replacing any pending one.
    pub fn arm(&mut self, delay_ms: u64) -> TickToken {
        self.disarm();
        self.last_token += 1;
        let token = TickToken(self.last_token);
        let fires = self.fires.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = fires.send(token);
        });
        log::trace!("tick {:?} armed for {} ms", token, delay_ms);
        self.pending = Some((token, handle));
        token
    }

    /// Cancel the pending tick, if any.
    pub fn disarm(&mut self) {
        if let Some((token, handle)) = self.pending.take() {
            handle.abort();
            log::trace!("tick {:?} cancelled", token);
        }
    }

    /// Consume `token` if it is the pending tick. Stale tokens return false.
    pub fn accept(&mut self, token: TickToken) -> bool {
        match &self.pending {
            Some((pending, _)) if *pending == token => {
                self.pending = None;
                true
            }
            _ => {
                log::debug!("ignoring stale tick {:?}", token);
                false
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}
