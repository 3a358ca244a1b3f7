//! Authorization ledger implementation
//!
//! Allowances and obligations live in memory behind a lock and are written
//! through to storage. Every operation first applies its local change,
//! then persists it, then mirrors it into the token-locking ledger. If any
//! later step fails the local change is undone before the error is returned.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use colony_core::{
    Address, DomainId, ExternalResult, JsonStorage, PermissionGate, Role, StakeLocking, Storage,
};

use crate::{LedgerError, LedgerResult, StakeKey, StakeLedger, StakeTransfer};

/// Path constants for storage
const ALLOWANCES_PATH: &str = "ledger/allowances";
const OBLIGATIONS_PATH: &str = "ledger/obligations";

/// Which of the two books an entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Book {
    Allowances,
    Obligations,
}

impl Book {
    fn path(&self) -> &'static str {
        match self {
            Book::Allowances => ALLOWANCES_PATH,
            Book::Obligations => OBLIGATIONS_PATH,
        }
    }

    fn storage_key(&self, key: &StakeKey) -> String {
        format!("{}/{}", self.path(), key.storage_segment())
    }
}

#[derive(Debug, Clone, Copy)]
enum Delta {
    Credit(u128),
    Debit(u128),
}

/// A single adjustment to one entry
#[derive(Debug, Clone, Copy)]
struct Change {
    book: Book,
    key: StakeKey,
    delta: Delta,
}

impl Change {
    fn credit(book: Book, key: StakeKey, amount: u128) -> Self {
        Self { book, key, delta: Delta::Credit(amount) }
    }

    fn debit(book: Book, key: StakeKey, amount: u128) -> Self {
        Self { book, key, delta: Delta::Debit(amount) }
    }
}

/// Persisted form of a single entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StakeEntry {
    key: StakeKey,
    amount: u128,
}

#[derive(Debug, Default)]
struct LedgerState {
    allowances: BTreeMap<StakeKey, u128>,
    obligations: BTreeMap<StakeKey, u128>,
}

impl LedgerState {
    fn book(&self, book: Book) -> &BTreeMap<StakeKey, u128> {
        match book {
            Book::Allowances => &self.allowances,
            Book::Obligations => &self.obligations,
        }
    }

    fn book_mut(&mut self, book: Book) -> &mut BTreeMap<StakeKey, u128> {
        match book {
            Book::Allowances => &mut self.allowances,
            Book::Obligations => &mut self.obligations,
        }
    }

    fn get(&self, book: Book, key: &StakeKey) -> u128 {
        self.book(book).get(key).copied().unwrap_or(0)
    }

    fn set(&mut self, book: Book, key: StakeKey, amount: u128) {
        // Zero entries are logically absent
        if amount == 0 {
            self.book_mut(book).remove(&key);
        } else {
            self.book_mut(book).insert(key, amount);
        }
    }
}

/// The stake authorization ledger of one colony
pub struct AuthorizationLedger {
    /// The colony token that stake is denominated in
    token: Address,
    /// External token-locking ledger
    stake_locking: Arc<dyn StakeLocking>,
    /// Permission hierarchy for transfers
    permissions: Arc<dyn PermissionGate>,
    /// Storage for ledger entries
    storage: Arc<dyn Storage>,
    /// Allowances and obligations
    state: RwLock<LedgerState>,
}

impl AuthorizationLedger {
    /// Open the ledger, loading any entries already in storage
    pub async fn open(
        token: Address,
        stake_locking: Arc<dyn StakeLocking>,
        permissions: Arc<dyn PermissionGate>,
        storage: Arc<dyn Storage>,
    ) -> LedgerResult<Self> {
        let ledger = Self {
            token,
            stake_locking,
            permissions,
            storage,
            state: RwLock::new(LedgerState::default()),
        };

        ledger.load_book(Book::Allowances).await?;
        ledger.load_book(Book::Obligations).await?;

        Ok(ledger)
    }

    /// The token this ledger mirrors stake for
    pub fn token(&self) -> Address {
        self.token
    }

    /// Load one book from storage
    async fn load_book(&self, book: Book) -> LedgerResult<()> {
        let keys = self.storage.list(&format!("{}/", book.path())).await?;
        let mut state = self.state.write().await;

        for key in keys {
            let entry: StakeEntry = self.storage.get_json(&key).await?;
            state.set(book, entry.key, entry.amount);
        }

        info!("Loaded {} entries from {}", state.book(book).len(), book.path());
        Ok(())
    }

    /// Apply a batch of changes under a single lock; either all apply or none
    async fn apply_changes(&self, changes: &[Change]) -> LedgerResult<Vec<(Book, StakeKey, u128)>> {
        let mut state = self.state.write().await;
        let mut updated: Vec<(Book, StakeKey, u128)> = Vec::with_capacity(changes.len());

        for change in changes {
            let current = updated
                .iter()
                .rev()
                .find(|(book, key, _)| *book == change.book && *key == change.key)
                .map(|(_, _, amount)| *amount)
                .unwrap_or_else(|| state.get(change.book, &change.key));

            let next = match change.delta {
                Delta::Credit(amount) => current.checked_add(amount).ok_or_else(|| {
                    LedgerError::Overflow(format!(
                        "{:?} for {} would exceed {}",
                        change.book,
                        change.key,
                        u128::MAX
                    ))
                })?,
                Delta::Debit(amount) => match current.checked_sub(amount) {
                    Some(next) => next,
                    None => return Err(shortfall(change, current, amount)),
                },
            };

            updated.push((change.book, change.key, next));
        }

        for (book, key, amount) in &updated {
            state.set(*book, *key, *amount);
        }

        Ok(updated)
    }

    /// Write the given entries through to storage
    async fn persist(&self, entries: &[(Book, StakeKey, u128)]) -> LedgerResult<()> {
        for (book, key, amount) in entries {
            let storage_key = book.storage_key(key);
            if *amount == 0 {
                self.storage.delete(&storage_key).await?;
            } else {
                let entry = StakeEntry { key: *key, amount: *amount };
                self.storage.put_json(&storage_key, &entry).await?;
            }
        }
        Ok(())
    }

    /// Apply `changes` locally, then persist and mirror them
    ///
    /// No lock is held while `mirror` runs, so a call that re-enters the
    /// ledger from the external side sees the updated figures.
    async fn commit<F>(&self, changes: Vec<Change>, mirror: F) -> LedgerResult<()>
    where
        F: Future<Output = ExternalResult<()>> + Send,
    {
        let written = self.apply_changes(&changes).await?;

        let outcome = match self.persist(&written).await {
            Ok(()) => mirror.await.map_err(LedgerError::from),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            warn!("Reverting stake ledger change after failure: {}", e);
            self.revert(&changes).await;
            return Err(e);
        }

        Ok(())
    }

    /// Undo a batch of changes that has already been applied
    ///
    /// Each entry is restored on its own. An entry that a re-entrant call
    /// drew down in the meantime is clamped at zero, and the other entries
    /// of the batch are still restored.
    async fn revert(&self, changes: &[Change]) {
        let restored = {
            let mut state = self.state.write().await;
            let mut restored = Vec::with_capacity(changes.len());

            for change in changes.iter().rev() {
                let current = state.get(change.book, &change.key);
                let next = match change.delta {
                    Delta::Credit(amount) => {
                        if current < amount {
                            let underflow = LedgerError::Underflow(format!(
                                "{:?} for {} is {}, cannot remove {}",
                                change.book, change.key, current, amount
                            ));
                            error!("Clamping while reverting: {}", underflow);
                        }
                        current.saturating_sub(amount)
                    }
                    Delta::Debit(amount) => current.saturating_add(amount),
                };
                state.set(change.book, change.key, next);
                restored.push((change.book, change.key, next));
            }

            restored
        };

        if let Err(e) = self.persist(&restored).await {
            error!("Failed to persist reverted stake ledger entries: {}", e);
        }
    }
}

fn shortfall(change: &Change, available: u128, requested: u128) -> LedgerError {
    match change.book {
        Book::Allowances => LedgerError::InsufficientAllowance { requested, available },
        Book::Obligations => LedgerError::InsufficientObligation { requested, available },
    }
}

#[async_trait]
impl StakeLedger for AuthorizationLedger {
    async fn approve(
        &self,
        depositor: Address,
        obligator: Address,
        domain: DomainId,
        amount: u128,
    ) -> LedgerResult<()> {
        let key = StakeKey::new(depositor, obligator, domain);
        debug!("Approving {} of stake for {}", amount, key);

        self.commit(
            vec![Change::credit(Book::Allowances, key, amount)],
            self.stake_locking.approve_stake(depositor, amount, self.token),
        ).await?;

        info!("Approved {} of stake for {}", amount, key);
        Ok(())
    }

    async fn obligate(
        &self,
        user: Address,
        obligator: Address,
        domain: DomainId,
        amount: u128,
    ) -> LedgerResult<()> {
        let key = StakeKey::new(user, obligator, domain);
        debug!("Obligating {} of stake for {}", amount, key);

        self.commit(
            vec![
                Change::debit(Book::Allowances, key, amount),
                Change::credit(Book::Obligations, key, amount),
            ],
            self.stake_locking.obligate_stake(user, amount, self.token),
        ).await?;

        info!("Obligated {} of stake for {}", amount, key);
        Ok(())
    }

    async fn deobligate(
        &self,
        user: Address,
        obligator: Address,
        domain: DomainId,
        amount: u128,
    ) -> LedgerResult<()> {
        let key = StakeKey::new(user, obligator, domain);
        debug!("Deobligating {} of stake for {}", amount, key);

        self.commit(
            vec![Change::debit(Book::Obligations, key, amount)],
            self.stake_locking.deobligate_stake(user, amount, self.token),
        ).await?;

        info!("Deobligated {} of stake for {}", amount, key);
        Ok(())
    }

    async fn transfer(&self, request: StakeTransfer) -> LedgerResult<()> {
        let authorized = self.permissions.check(
            request.caller,
            request.permission_domain_id,
            request.child_skill_index,
            request.domain,
            Role::Arbitration,
        ).await?;

        if !authorized {
            warn!(
                "Rejected stake transfer by {}: no arbitration role over domain {}",
                request.caller, request.domain
            );
            return Err(LedgerError::Unauthorized(format!(
                "{} lacks the {} role over domain {}",
                request.caller,
                Role::Arbitration,
                request.domain
            )));
        }

        let key = StakeKey::new(request.user, request.obligator, request.domain);
        debug!("Transferring {} of stake for {} to {}", request.amount, key, request.beneficiary);

        self.commit(
            vec![Change::debit(Book::Obligations, key, request.amount)],
            self.stake_locking.transfer_stake(
                request.user,
                request.amount,
                self.token,
                request.beneficiary,
            ),
        ).await?;

        info!("Transferred {} of stake for {} to {}", request.amount, key, request.beneficiary);
        Ok(())
    }

    async fn allowance(&self, user: Address, obligator: Address, domain: DomainId) -> u128 {
        let state = self.state.read().await;
        state.get(Book::Allowances, &StakeKey::new(user, obligator, domain))
    }

    async fn obligation(&self, user: Address, obligator: Address, domain: DomainId) -> u128 {
        let state = self.state.read().await;
        state.get(Book::Obligations, &StakeKey::new(user, obligator, domain))
    }
}
