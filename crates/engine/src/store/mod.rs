//! Persistence boundaries of the engine.
//!
//! Services depend on these traits only. Two implementations ship with the
//! crate:
//!
//! - [`SqlStore`]: sea-orm over an explicit `DatabaseConnection`;
//! - [`MemoryStore`]: process-local maps with one lock per account.
//!
//! Every ledger mutation reduces to [`LedgerStore::apply_ledger_delta`]:
//! the entry write and the balance delta commit together or not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    Account, EntryPatch, ExecutionUpdate, LedgerEntry, RecurringTransaction, RecurringVersion,
    Reminder, ResultEngine,
};

mod memory;
mod sql;

pub use memory::MemoryStore;
pub use sql::SqlStore;

/// The entry side of an atomic ledger mutation.
///
/// `Update` and `Void` carry the amount the caller based its balance delta
/// on; the store refuses the write if the entry no longer has it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryWrite {
    Insert(LedgerEntry),
    Update {
        entry_id: Uuid,
        expected_amount_minor: i64,
        patch: EntryPatch,
        updated_at: DateTime<Utc>,
    },
    Void {
        entry_id: Uuid,
        expected_amount_minor: i64,
        voided_at: DateTime<Utc>,
    },
}

impl EntryWrite {
    pub(crate) fn entry_id(&self) -> Uuid {
        match self {
            Self::Insert(entry) => entry.id,
            Self::Update { entry_id, .. } | Self::Void { entry_id, .. } => *entry_id,
        }
    }
}

/// Result of [`LedgerStore::apply_ledger_delta`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied(Uuid),
    /// An insert repeated an idempotency key: nothing was written, the id is
    /// the entry that already carries the key.
    Duplicate(Uuid),
}

impl WriteOutcome {
    #[must_use]
    pub fn entry_id(self) -> Uuid {
        match self {
            Self::Applied(id) | Self::Duplicate(id) => id,
        }
    }
}

/// Filters for listing ledger entries.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct EntryListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// If true, includes voided entries (default: false).
    pub include_voided: bool,
}

impl EntryListFilter {
    pub(crate) fn matches(&self, entry: &LedgerEntry) -> bool {
        (self.include_voided || !entry.is_voided)
            && self.from.is_none_or(|from| entry.date >= from)
            && self.to.is_none_or(|to| entry.date < to)
    }
}

#[async_trait]
pub trait AccountLookup: Send + Sync {
    /// Fails with `KeyNotFound` when the account does not exist.
    async fn account(&self, account_id: Uuid) -> ResultEngine<Account>;
}

#[async_trait]
pub trait LedgerStore: AccountLookup {
    async fn insert_account(&self, account: &Account) -> ResultEngine<()>;

    /// Writes `write` and adds `balance_delta` to the account balance as one
    /// atomic unit, serialized with every other mutation of the same account.
    async fn apply_ledger_delta(
        &self,
        account_id: Uuid,
        write: EntryWrite,
        balance_delta: i64,
    ) -> ResultEngine<WriteOutcome>;

    async fn entry(&self, entry_id: Uuid) -> ResultEngine<LedgerEntry>;

    /// Entries ordered by date, then creation time.
    async fn entries_for_account(
        &self,
        account_id: Uuid,
        filter: &EntryListFilter,
    ) -> ResultEngine<Vec<LedgerEntry>>;

    /// Rebuilds the cached balance from the live entries and returns it.
    async fn recompute_balance(&self, account_id: Uuid) -> ResultEngine<i64>;
}

#[async_trait]
pub trait RecurringTransactionStore: Send + Sync {
    async fn insert_recurring(&self, recurring: &RecurringTransaction) -> ResultEngine<()>;

    async fn recurring(&self, recurring_id: Uuid) -> ResultEngine<RecurringTransaction>;

    async fn recurring_for_user(&self, user_id: &str) -> ResultEngine<Vec<RecurringTransaction>>;

    /// Active rows with `next_due <= before`, oldest first.
    async fn active_due_before(
        &self,
        before: DateTime<Utc>,
    ) -> ResultEngine<Vec<RecurringTransaction>>;

    /// Replaces the stored row with `recurring`. Fails with `Conflict` when
    /// the row no longer matches `expected`, so a reschedule committed after
    /// the caller's read is never overwritten.
    async fn update_recurring(
        &self,
        recurring: &RecurringTransaction,
        expected: RecurringVersion,
    ) -> ResultEngine<()>;

    /// Records an execution. Fails with `Conflict` unless the row is still
    /// active and still due at `expected_next_due`.
    async fn update_execution_state(
        &self,
        recurring_id: Uuid,
        expected_next_due: DateTime<Utc>,
        update: ExecutionUpdate,
    ) -> ResultEngine<()>;

    /// Soft delete: active or paused rows become cancelled.
    async fn cancel_recurring(&self, recurring_id: Uuid, at: DateTime<Utc>) -> ResultEngine<()>;
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn insert_reminder(&self, reminder: &Reminder) -> ResultEngine<()>;

    async fn reminders_for_recurring(&self, recurring_id: Uuid) -> ResultEngine<Vec<Reminder>>;

    /// Unread reminders dated `<= before` whose recurring transaction is
    /// active and belongs to `user_id`, oldest first.
    async fn active_reminders_for_user_before(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> ResultEngine<Vec<Reminder>>;

    /// Deletes the unread reminders of a recurring transaction whose
    /// schedule moved. Returns how many were removed.
    async fn discard_unread_reminders(&self, recurring_id: Uuid) -> ResultEngine<u64>;

    async fn reminder(&self, reminder_id: Uuid) -> ResultEngine<Reminder>;

    /// Idempotent: an already read reminder keeps its first `read_at`.
    async fn mark_reminder_read(&self, reminder_id: Uuid, at: DateTime<Utc>)
    -> ResultEngine<Reminder>;
}
