//! Persisted request quota.
//!
//! The ledger fails open: an absent or unparsable counter reads as the
//! configured maximum, so corrupted state never locks a user out. Counters are
//! not locked across processes; two writers sharing a store may race.

mod store;

pub use store::{FileQuotaStore, MemoryQuotaStore, QuotaError, QuotaStore, StoredCount};

use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_MAX_REQUESTS: u32 = 100;

#[derive(Debug, Clone)]
pub struct UsageLedger {
    store: Arc<dyn QuotaStore>,
    max: u32,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn QuotaStore>, max: u32) -> Self {
        Self { store, max }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn remaining(&self) -> Result<u32, QuotaError> {
        match self.store.load()? {
            StoredCount::Absent => Ok(self.max),
            StoredCount::Corrupt(raw) => {
                warn!(raw = %raw.trim(), max = self.max, "usage counter is corrupt, treating as full");
                Ok(self.max)
            }
            StoredCount::Value(value) => Ok(value.min(self.max)),
        }
    }

    /// Spends one request and persists the result. Clamps at zero; callers
    /// are expected to check [`remaining`](Self::remaining) first.
    pub fn consume(&self) -> Result<u32, QuotaError> {
        let next = self.remaining()?.saturating_sub(1);
        self.store.save(next)?;
        Ok(next)
    }

    pub fn reset(&self) -> Result<(), QuotaError> {
        self.store.clear()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotaScope {
    #[default]
    Global,
    PerClient,
}

impl FromStr for QuotaScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "global" => Ok(Self::Global),
            "per_client" => Ok(Self::PerClient),
            _ => Err(format!("unknown scope '{value}'")),
        }
    }
}

/// Hands out the ledger that governs a given caller.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    store: Arc<dyn QuotaStore>,
    max: u32,
    scope: QuotaScope,
}

impl QuotaPolicy {
    pub fn new(store: Arc<dyn QuotaStore>, max: u32, scope: QuotaScope) -> Self {
        Self { store, max, scope }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn scope(&self) -> QuotaScope {
        self.scope
    }

    pub fn ledger_for(&self, client: Option<&str>) -> UsageLedger {
        match (self.scope, client) {
            (QuotaScope::PerClient, Some(client)) => {
                UsageLedger::new(self.store.scoped(client), self.max)
            }
            _ => UsageLedger::new(Arc::clone(&self.store), self.max),
        }
    }
}
