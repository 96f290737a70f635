use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing the traffic a channel has handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Listen requests that started a session
    pub listens_accepted: u64,

    /// Listen requests refused because a session was already active
    pub listens_rejected: u64,

    /// Cancel requests that ended a session
    pub cancels: u64,

    /// Events and error events handed to the transport
    pub events_sent: u64,

    /// Events and error events discarded because their session was over
    pub events_dropped: u64,

    /// Events and error events replaced by an `encode` error
    pub encode_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) listens_accepted: AtomicU64,
    pub(crate) listens_rejected: AtomicU64,
    pub(crate) cancels: AtomicU64,
    pub(crate) events_sent: AtomicU64,
    pub(crate) events_dropped: AtomicU64,
    pub(crate) encode_failures: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            listens_accepted: self.listens_accepted.load(Ordering::Relaxed),
            listens_rejected: self.listens_rejected.load(Ordering::Relaxed),
            cancels: self.cancels.load(Ordering::Relaxed),
            events_sent: self.events_sent.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
        }
    }
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}
