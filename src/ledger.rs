//! Append-only wallet ledger
//!
//! Every posting writes one immutable entry and moves the owner's cached
//! `wallet_balance` in the same sled transaction, so the balance always
//! equals the signed sum of the entries. Entries are chained per user by the
//! sha256 digest of the previous entry; the user record carries the head
//! and the next entry number, so key order is always chain order.
use rust_decimal::Decimal;
use sled::transaction::{ConflictableTransactionResult, TransactionalTree, abort};
use tracing::debug;

use super::error::{OrAbort, PortalError};
use super::store::{Store, encode, load_tx, save_tx};
use super::types::{Money, TimeStamp};
use super::user::User;
use super::utils::{owner_prefix, seq_key};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    #[n(0)]
    Credit,
    #[n(1)]
    Debit,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Credit => "credit",
            EntryKind::Debit => "debit",
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub user_id: String,
    #[n(2)]
    pub task_id: Option<String>,
    #[n(3)]
    pub amount: Money, // magnitude, sign comes from kind
    #[n(4)]
    pub kind: EntryKind,
    #[n(5)]
    pub description: String,
    #[n(6)]
    pub created_at: TimeStamp,
    #[n(7)]
    pub prev_digest: Option<String>,
}

impl LedgerEntry {
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            EntryKind::Credit => self.amount.amount(),
            EntryKind::Debit => -self.amount.amount(),
        }
    }
    /// Returns the entry's sha256 digest together with its CBOR encoding.
    pub fn build(&self) -> Result<(String, Vec<u8>), PortalError> {
        let cbor = encode(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

/// A single posting request.
#[derive(Debug, Clone)]
pub(crate) struct Posting {
    pub(crate) user_id: String,
    pub(crate) task_id: Option<String>,
    pub(crate) amount: Money,
    pub(crate) kind: EntryKind,
    pub(crate) description: String,
}

impl Posting {
    pub(crate) fn credit(user_id: &str, amount: Money, description: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            task_id: None,
            amount,
            kind: EntryKind::Credit,
            description: description.to_string(),
        }
    }
    #[cfg(test)]
    pub(crate) fn debit(user_id: &str, amount: Money, description: &str) -> Self {
        Self {
            kind: EntryKind::Debit,
            ..Self::credit(user_id, amount, description)
        }
    }
    pub(crate) fn for_task(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }
}

/// Appends `posting` and moves the wallet as part of the caller's transaction.
pub(crate) fn post_tx(
    users: &TransactionalTree,
    ledger: &TransactionalTree,
    posting: &Posting,
    now: TimeStamp,
) -> ConflictableTransactionResult<LedgerEntry, PortalError> {
    if posting.amount.is_negative() {
        return abort(PortalError::Validation(format!(
            "posting amount {} must not be negative",
            posting.amount
        )));
    }
    let mut user: User = load_tx(users, &posting.user_id, "user")?;

    let entry = LedgerEntry {
        id: user.ledger_len,
        user_id: posting.user_id.clone(),
        task_id: posting.task_id.clone(),
        amount: posting.amount,
        kind: posting.kind,
        description: posting.description.clone(),
        created_at: now,
        prev_digest: user.ledger_head.clone(),
    };
    let (digest, cbor) = entry.build().or_abort()?;

    user.wallet_balance = user.wallet_balance.checked_add(entry.signed_amount()).or_abort()?;
    user.ledger_head = Some(digest);
    user.ledger_len += 1;

    ledger.insert(seq_key(&entry.user_id, entry.id).as_bytes(), cbor)?;
    save_tx(users, &user.id, &user)?;

    Ok(entry)
}

/// Outcome of replaying one user's ledger against their cached wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAudit {
    pub user_id: String,
    pub entries: usize,
    pub cached_balance: Money,
    pub derived_balance: Money,
    pub chain_intact: bool,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.chain_intact && self.cached_balance == self.derived_balance
    }
}

/// Read access to the wallet ledger. Postings only come from workflow
/// transitions inside the crate.
pub struct Ledger<'s> {
    store: &'s Store,
}

impl<'s> Ledger<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// The user's entries, oldest first.
    pub fn entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>, PortalError> {
        self.store.scan(&self.store.ledger, &owner_prefix(user_id))
    }

    pub fn balance(&self, user_id: &str) -> Result<Money, PortalError> {
        let user: User = self.store.get(&self.store.users, user_id, "user")?;
        Ok(user.wallet_balance)
    }

    /// Replays the entries, checking the digest chain and the running sum.
    pub fn audit(&self, user_id: &str) -> Result<LedgerAudit, PortalError> {
        let user: User = self.store.get(&self.store.users, user_id, "user")?;
        let entries = self.entries(user_id)?;

        let mut derived = Money::ZERO;
        let mut head: Option<String> = None;
        let mut chain_intact = true;

        for entry in &entries {
            if entry.prev_digest != head {
                chain_intact = false;
            }
            derived = derived.checked_add(entry.signed_amount())?;
            head = Some(entry.build()?.0);
        }
        if head != user.ledger_head {
            chain_intact = false;
        }

        debug!(user = user_id, entries = entries.len(), chain_intact, "ledger audited");
        Ok(LedgerAudit {
            user_id: user_id.to_string(),
            entries: entries.len(),
            cached_balance: user.wallet_balance,
            derived_balance: derived,
            chain_intact,
        })
    }
}
