//! Collaborator seams: persistence, economy and notification
//!
//! The core never blocks on these. Routine saves are fire-and-forget (a
//! failure is logged, not propagated); the one exception is the siege
//! terminal-outcome save, which the state machine requires to succeed before
//! a conquest is considered complete.

use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::core::error::{DemesneError, Result};
use crate::core::types::{ActorId, FederationId, PolityId};
use crate::polity::polity::Polity;
use crate::siege::session::SiegeSession;
use crate::territory::claim::Claim;

/// An account in the economy ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerAccount {
    Polity(PolityId),
    Federation(FederationId),
    Actor(ActorId),
}

/// Durable storage seam. Assumed eventually durable; only
/// `save_siege_outcome` failures are escalated by the core.
pub trait Persistence: Send + Sync {
    fn save_claim(&self, claim: &Claim) -> Result<()>;
    fn save_polity(&self, polity: &Polity) -> Result<()>;
    fn save_siege_outcome(&self, session: &SiegeSession) -> Result<()>;
}

/// Economy ledger seam. The core depends only on the deposit/withdraw
/// contract and a queryable balance; currency storage lives elsewhere.
pub trait EconomyLedger: Send + Sync {
    fn deposit(&self, account: LedgerAccount, amount: f64, memo: &str) -> Result<bool>;
    fn withdraw(&self, account: LedgerAccount, amount: f64, memo: &str) -> Result<bool>;
    fn balance(&self, account: LedgerAccount) -> f64;
}

/// Message sink seam, fire-and-forget
pub trait Notifier: Send + Sync {
    fn message(&self, actor: ActorId, text: &str);
    fn notify_polity(&self, polity: PolityId, text: &str);
    fn notify_federation(&self, federation: FederationId, text: &str);
    fn broadcast(&self, text: &str);
}

/// In-memory persistence that counts saves, keeps encoded claim records and
/// can be told to fail siege outcome saves, for exercising the escalation
/// path
#[derive(Default)]
pub struct MemoryPersistence {
    saves: Mutex<SaveCounts>,
    claim_records: Mutex<Vec<String>>,
    fail_siege_saves: AtomicBool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveCounts {
    pub claims: usize,
    pub polities: usize,
    pub siege_outcomes: usize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> SaveCounts {
        *self.saves.lock()
    }

    pub fn fail_siege_saves(&self, fail: bool) {
        self.fail_siege_saves.store(fail, Ordering::SeqCst);
    }

    pub fn claim_records(&self) -> Vec<String> {
        self.claim_records.lock().clone()
    }
}

impl Persistence for MemoryPersistence {
    fn save_claim(&self, claim: &Claim) -> Result<()> {
        let encoded = serde_json::to_string(claim)?;
        self.claim_records.lock().push(encoded);
        self.saves.lock().claims += 1;
        Ok(())
    }

    fn save_polity(&self, _polity: &Polity) -> Result<()> {
        self.saves.lock().polities += 1;
        Ok(())
    }

    fn save_siege_outcome(&self, _session: &SiegeSession) -> Result<()> {
        if self.fail_siege_saves.load(Ordering::SeqCst) {
            return Err(DemesneError::PersistenceFailed(
                "siege outcome store unavailable".into(),
            ));
        }
        self.saves.lock().siege_outcomes += 1;
        Ok(())
    }
}

/// In-memory ledger backed by a balance map
#[derive(Default)]
pub struct MemoryLedger {
    balances: Mutex<AHashMap<LedgerAccount, f64>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(account: LedgerAccount, balance: f64) -> Self {
        let ledger = Self::new();
        ledger.balances.lock().insert(account, balance);
        ledger
    }
}

impl EconomyLedger for MemoryLedger {
    fn deposit(&self, account: LedgerAccount, amount: f64, _memo: &str) -> Result<bool> {
        if amount < 0.0 {
            return Err(DemesneError::InvalidAction(
                "deposit amount must be non-negative".into(),
            ));
        }
        *self.balances.lock().entry(account).or_insert(0.0) += amount;
        Ok(true)
    }

    fn withdraw(&self, account: LedgerAccount, amount: f64, _memo: &str) -> Result<bool> {
        if amount < 0.0 {
            return Err(DemesneError::InvalidAction(
                "withdrawal amount must be non-negative".into(),
            ));
        }
        let mut balances = self.balances.lock();
        let balance = balances.entry(account).or_insert(0.0);
        if *balance < amount {
            return Ok(false);
        }
        *balance -= amount;
        Ok(true)
    }

    fn balance(&self, account: LedgerAccount) -> f64 {
        self.balances.lock().get(&account).copied().unwrap_or(0.0)
    }
}

/// A delivered notice, recorded for assertions
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Actor(ActorId, String),
    Polity(PolityId, String),
    Federation(FederationId, String),
    Broadcast(String),
}

/// Notifier that records every notice it delivers
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notice::Broadcast(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn message(&self, actor: ActorId, text: &str) {
        self.notices.lock().push(Notice::Actor(actor, text.into()));
    }

    fn notify_polity(&self, polity: PolityId, text: &str) {
        self.notices.lock().push(Notice::Polity(polity, text.into()));
    }

    fn notify_federation(&self, federation: FederationId, text: &str) {
        self.notices
            .lock()
            .push(Notice::Federation(federation, text.into()));
    }

    fn broadcast(&self, text: &str) {
        self.notices.lock().push(Notice::Broadcast(text.into()));
    }
}
