use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

const EMPTY: u64 = 0;

/// Identifies one listen session on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(NonZeroU64);

impl SessionToken {
    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lock-free record of which session, if any, currently owns a channel
///
/// Holds either nothing or the token of the active session. Every transition is a
/// single atomic operation.
#[derive(Debug)]
pub(crate) struct ActiveSlot {
    current: AtomicU64,
    next_token: AtomicU64,
}

impl ActiveSlot {
    pub(crate) fn new() -> Self {
        Self {
            current: AtomicU64::new(EMPTY),
            next_token: AtomicU64::new(1),
        }
    }

    /// Issue a token never handed out before by this slot
    pub(crate) fn issue(&self) -> SessionToken {
        let raw = self.next_token.fetch_add(1, Ordering::Relaxed);
        // Starts at 1; wrapping past u64::MAX is not reachable in practice.
        SessionToken(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Install `token` if the slot is empty
    pub(crate) fn try_claim(&self, token: SessionToken) -> bool {
        self.current
            .compare_exchange(EMPTY, token.get(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Empty the slot if it still holds `token`
    pub(crate) fn release(&self, token: SessionToken) -> bool {
        self.current
            .compare_exchange(token.get(), EMPTY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Empty the slot, returning the session it held
    pub(crate) fn take(&self) -> Option<SessionToken> {
        NonZeroU64::new(self.current.swap(EMPTY, Ordering::AcqRel)).map(SessionToken)
    }

    pub(crate) fn is_active(&self, token: SessionToken) -> bool {
        self.current.load(Ordering::Acquire) == token.get()
    }

    pub(crate) fn current(&self) -> Option<SessionToken> {
        NonZeroU64::new(self.current.load(Ordering::Acquire)).map(SessionToken)
    }
}
