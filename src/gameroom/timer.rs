use super::room::Input;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// The three timer classes a channel owns. At most one of each is
/// armed at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Betting,
    Turn,
    Phase,
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Betting => write!(f, "betting"),
            Self::Turn => write!(f, "turn"),
            Self::Phase => write!(f, "phase"),
        }
    }
}

/// A single-armed timer. Arming always cancels the predecessor; ticks
/// carry the epoch they were armed under, so a tick that raced its own
/// cancellation is recognizably stale and dropped. Cancel is
/// idempotent.
#[derive(Debug, Default)]
pub struct TimerSlot {
    epoch: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn arm(&mut self, kind: TimerKind, duration: Duration, tx: &UnboundedSender<Input>) {
        self.cancel();
        let epoch = self.epoch;
        let tx = tx.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(Input::Tick { kind, epoch });
        }));
    }
    pub fn cancel(&mut self) {
        self.epoch += 1;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
    /// Claims a tick: true exactly once, for the epoch it was armed
    /// under. Everything else is stale.
    pub fn expire(&mut self, epoch: u64) -> bool {
        if self.handle.is_some() && self.epoch == epoch {
            self.handle = None;
            true
        } else {
            false
        }
    }
    pub fn armed(&self) -> bool {
        self.handle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn tick_carries_epoch() {
        let (tx, mut rx) = unbounded_channel();
        let mut slot = TimerSlot::default();
        slot.arm(TimerKind::Turn, Duration::from_millis(5), &tx);
        match rx.recv().await {
            Some(Input::Tick { kind, epoch }) => {
                assert_eq!(kind, TimerKind::Turn);
                assert!(slot.expire(epoch));
                assert!(!slot.expire(epoch));
            }
            other => panic!("unexpected input: {:?}", other),
        }
    }

    #[tokio::test]
    async fn rearm_staleness() {
        let (tx, mut rx) = unbounded_channel();
        let mut slot = TimerSlot::default();
        slot.arm(TimerKind::Betting, Duration::from_millis(5), &tx);
        let first = match rx.recv().await {
            Some(Input::Tick { epoch, .. }) => epoch,
            other => panic!("unexpected input: {:?}", other),
        };
        // a new arm supersedes the delivered-but-unclaimed tick
        slot.arm(TimerKind::Betting, Duration::from_millis(5), &tx);
        assert!(!slot.expire(first));
        assert!(slot.armed());
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let (tx, _rx) = unbounded_channel();
        let mut slot = TimerSlot::default();
        slot.arm(TimerKind::Phase, Duration::from_secs(60), &tx);
        slot.cancel();
        slot.cancel();
        assert!(!slot.armed());
    }
}
