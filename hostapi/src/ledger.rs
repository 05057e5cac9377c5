//! Execution context accounting.
//!
//! Every backend counts the contexts it creates and destroys in a
//! `ContextLedger`. The counts are the observable side of the resource law:
//! once no invocation is in flight, `created == destroyed`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a [`ContextLedger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerSnapshot {
    pub created: u64,
    pub destroyed: u64,
    /// Context creation attempts the backend refused.
    pub refused: u64,
}

impl LedgerSnapshot {
    /// Contexts created and not yet destroyed.
    pub fn live(&self) -> u64 {
        self.created.saturating_sub(self.destroyed)
    }

    /// True when every created context has been destroyed.
    pub fn is_balanced(&self) -> bool {
        self.created == self.destroyed
    }
}

/// Thread-safe context creation/destruction counter.
#[derive(Debug, Default)]
pub struct ContextLedger {
    created: AtomicU64,
    destroyed: AtomicU64,
    refused: AtomicU64,
}

impl ContextLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_destroyed(&self) {
        self.destroyed.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_refused(&self) {
        self.refused.fetch_add(1, Ordering::AcqRel);
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            created: self.created.load(Ordering::Acquire),
            destroyed: self.destroyed.load(Ordering::Acquire),
            refused: self.refused.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_ledger_is_balanced() {
        let ledger = ContextLedger::new();
        let snap = ledger.snapshot();
        assert!(snap.is_balanced());
        assert_eq!(snap.live(), 0);
        assert_eq!(snap, LedgerSnapshot::default());
    }

    #[test]
    fn test_live_count() {
        let ledger = ContextLedger::new();
        ledger.record_created();
        ledger.record_created();
        ledger.record_destroyed();
        ledger.record_refused();
        let snap = ledger.snapshot();
        assert_eq!(snap.live(), 1);
        assert_eq!(snap.refused, 1);
        assert!(!snap.is_balanced());
    }

    proptest! {
        #[test]
        fn prop_paired_records_balance(pairs in 0usize..64, refusals in 0usize..8) {
            let ledger = ContextLedger::new();
            for _ in 0..pairs {
                ledger.record_created();
            }
            for _ in 0..refusals {
                ledger.record_refused();
            }
            for _ in 0..pairs {
                ledger.record_destroyed();
            }
            let snap = ledger.snapshot();
            prop_assert!(snap.is_balanced());
            prop_assert_eq!(snap.created, pairs as u64);
            prop_assert_eq!(snap.refused, refusals as u64);
        }
    }
}
