//! Process-local store.
//!
//! Each account owns its entries behind its own mutex, so mutations of one
//! account serialize while different accounts proceed in parallel. The
//! map-level locks are only held long enough to look an account up.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    Account, EngineError, ExecutionUpdate, LedgerEntry, RecurringStatus, RecurringTransaction,
    RecurringVersion, Reminder, ResultEngine,
};

use super::{
    AccountLookup, EntryListFilter, EntryWrite, LedgerStore, RecurringTransactionStore,
    ReminderStore, WriteOutcome,
};

#[derive(Debug)]
struct AccountBook {
    account: Account,
    entries: HashMap<Uuid, LedgerEntry>,
    idempotency_keys: HashMap<String, Uuid>,
}

impl AccountBook {
    fn guarded_entry(
        &mut self,
        entry_id: Uuid,
        expected_amount_minor: i64,
    ) -> ResultEngine<&mut LedgerEntry> {
        let entry = self
            .entries
            .get_mut(&entry_id)
            .ok_or_else(|| EngineError::KeyNotFound("entry not exists".to_string()))?;
        if entry.is_voided {
            return Err(EngineError::AlreadyVoided(entry_id.to_string()));
        }
        if entry.amount_minor != expected_amount_minor {
            return Err(EngineError::Conflict(format!(
                "entry {entry_id} changed concurrently"
            )));
        }
        Ok(entry)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<Uuid, Arc<Mutex<AccountBook>>>>,
    entry_accounts: RwLock<HashMap<Uuid, Uuid>>,
    recurring: RwLock<HashMap<Uuid, RecurringTransaction>>,
    reminders: RwLock<HashMap<Uuid, Reminder>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn book(&self, account_id: Uuid) -> ResultEngine<Arc<Mutex<AccountBook>>> {
        self.accounts
            .read()
            .await
            .get(&account_id)
            .cloned()
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))
    }
}

#[async_trait]
impl AccountLookup for MemoryStore {
    async fn account(&self, account_id: Uuid) -> ResultEngine<Account> {
        let book = self.book(account_id).await?;
        let book = book.lock().await;
        Ok(book.account.clone())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_account(&self, account: &Account) -> ResultEngine<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.id) {
            return Err(EngineError::InvalidState(format!(
                "account {} already exists",
                account.id
            )));
        }
        accounts.insert(
            account.id,
            Arc::new(Mutex::new(AccountBook {
                account: account.clone(),
                entries: HashMap::new(),
                idempotency_keys: HashMap::new(),
            })),
        );
        Ok(())
    }

    async fn apply_ledger_delta(
        &self,
        account_id: Uuid,
        write: EntryWrite,
        balance_delta: i64,
    ) -> ResultEngine<WriteOutcome> {
        let book = self.book(account_id).await?;
        let mut book = book.lock().await;

        // Validate everything before touching state: nothing below may fail.
        let new_balance = book
            .account
            .balance_minor
            .checked_add(balance_delta)
            .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;

        let outcome = match write {
            EntryWrite::Insert(entry) => {
                if let Some(existing) = entry
                    .idempotency_key
                    .as_ref()
                    .and_then(|key| book.idempotency_keys.get(key))
                {
                    return Ok(WriteOutcome::Duplicate(*existing));
                }
                if entry.account_id != account_id {
                    return Err(EngineError::InvalidState(
                        "entry belongs to another account".to_string(),
                    ));
                }
                // Last await point: from here on the write runs to completion.
                let mut index = self.entry_accounts.write().await;
                let entry_id = entry.id;
                index.insert(entry_id, account_id);
                if let Some(key) = entry.idempotency_key.clone() {
                    book.idempotency_keys.insert(key, entry_id);
                }
                book.entries.insert(entry_id, entry);
                WriteOutcome::Applied(entry_id)
            }
            EntryWrite::Update {
                entry_id,
                expected_amount_minor,
                patch,
                updated_at,
            } => {
                let entry = book.guarded_entry(entry_id, expected_amount_minor)?;
                entry.apply_patch(&patch, updated_at);
                WriteOutcome::Applied(entry_id)
            }
            EntryWrite::Void {
                entry_id,
                expected_amount_minor,
                voided_at,
            } => {
                let entry = book.guarded_entry(entry_id, expected_amount_minor)?;
                entry.is_voided = true;
                entry.voided_at = Some(voided_at);
                entry.updated_at = voided_at;
                WriteOutcome::Applied(entry_id)
            }
        };

        book.account.balance_minor = new_balance;
        Ok(outcome)
    }

    async fn entry(&self, entry_id: Uuid) -> ResultEngine<LedgerEntry> {
        let account_id = self
            .entry_accounts
            .read()
            .await
            .get(&entry_id)
            .copied()
            .ok_or_else(|| EngineError::KeyNotFound("entry not exists".to_string()))?;
        let book = self.book(account_id).await?;
        let book = book.lock().await;
        book.entries
            .get(&entry_id)
            .cloned()
            .ok_or_else(|| EngineError::KeyNotFound("entry not exists".to_string()))
    }

    async fn entries_for_account(
        &self,
        account_id: Uuid,
        filter: &EntryListFilter,
    ) -> ResultEngine<Vec<LedgerEntry>> {
        let book = self.book(account_id).await?;
        let book = book.lock().await;
        let mut entries: Vec<LedgerEntry> = book
            .entries
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        entries.sort_by(|a, b| (a.date, a.created_at).cmp(&(b.date, b.created_at)));
        Ok(entries)
    }

    async fn recompute_balance(&self, account_id: Uuid) -> ResultEngine<i64> {
        let book = self.book(account_id).await?;
        let mut book = book.lock().await;
        let balance = book
            .entries
            .values()
            .try_fold(0_i64, |acc, entry| acc.checked_add(entry.live_amount_minor()))
            .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;
        book.account.balance_minor = balance;
        Ok(balance)
    }
}

#[async_trait]
impl RecurringTransactionStore for MemoryStore {
    async fn insert_recurring(&self, recurring: &RecurringTransaction) -> ResultEngine<()> {
        self.recurring
            .write()
            .await
            .insert(recurring.id, recurring.clone());
        Ok(())
    }

    async fn recurring(&self, recurring_id: Uuid) -> ResultEngine<RecurringTransaction> {
        self.recurring
            .read()
            .await
            .get(&recurring_id)
            .cloned()
            .ok_or_else(|| EngineError::KeyNotFound("recurring transaction not exists".to_string()))
    }

    async fn recurring_for_user(&self, user_id: &str) -> ResultEngine<Vec<RecurringTransaction>> {
        let mut rows: Vec<RecurringTransaction> = self
            .recurring
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn active_due_before(
        &self,
        before: DateTime<Utc>,
    ) -> ResultEngine<Vec<RecurringTransaction>> {
        let mut rows: Vec<RecurringTransaction> = self
            .recurring
            .read()
            .await
            .values()
            .filter(|r| r.status == RecurringStatus::Active && r.next_due <= before)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.next_due, r.created_at));
        Ok(rows)
    }

    async fn update_recurring(
        &self,
        recurring: &RecurringTransaction,
        expected: RecurringVersion,
    ) -> ResultEngine<()> {
        let mut rows = self.recurring.write().await;
        let row = rows
            .get_mut(&recurring.id)
            .ok_or_else(|| EngineError::KeyNotFound("recurring transaction not exists".to_string()))?;
        if row.version() != expected {
            return Err(EngineError::Conflict(format!(
                "recurring transaction {} changed concurrently",
                recurring.id
            )));
        }
        *row = recurring.clone();
        Ok(())
    }

    async fn update_execution_state(
        &self,
        recurring_id: Uuid,
        expected_next_due: DateTime<Utc>,
        update: ExecutionUpdate,
    ) -> ResultEngine<()> {
        let mut rows = self.recurring.write().await;
        let row = rows
            .get_mut(&recurring_id)
            .ok_or_else(|| EngineError::KeyNotFound("recurring transaction not exists".to_string()))?;
        if row.status != RecurringStatus::Active || row.next_due != expected_next_due {
            return Err(EngineError::Conflict(format!(
                "recurring transaction {recurring_id} was rescheduled concurrently"
            )));
        }
        row.last_executed = Some(update.last_executed);
        row.next_due = update.next_due;
        row.status = update.status;
        row.updated_at = update.last_executed;
        Ok(())
    }

    async fn cancel_recurring(&self, recurring_id: Uuid, at: DateTime<Utc>) -> ResultEngine<()> {
        let mut rows = self.recurring.write().await;
        let row = rows
            .get_mut(&recurring_id)
            .ok_or_else(|| EngineError::KeyNotFound("recurring transaction not exists".to_string()))?;
        if row.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "recurring transaction is already {}",
                row.status.as_str()
            )));
        }
        row.status = RecurringStatus::Cancelled;
        row.updated_at = at;
        Ok(())
    }
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn insert_reminder(&self, reminder: &Reminder) -> ResultEngine<()> {
        self.reminders
            .write()
            .await
            .insert(reminder.id, reminder.clone());
        Ok(())
    }

    async fn reminders_for_recurring(&self, recurring_id: Uuid) -> ResultEngine<Vec<Reminder>> {
        let mut rows: Vec<Reminder> = self
            .reminders
            .read()
            .await
            .values()
            .filter(|r| r.recurring_id == recurring_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.reminder_date);
        Ok(rows)
    }

    async fn active_reminders_for_user_before(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> ResultEngine<Vec<Reminder>> {
        let owned: Vec<Uuid> = self
            .recurring
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id && r.status == RecurringStatus::Active)
            .map(|r| r.id)
            .collect();
        let mut rows: Vec<Reminder> = self
            .reminders
            .read()
            .await
            .values()
            .filter(|r| !r.is_read && r.reminder_date <= before && owned.contains(&r.recurring_id))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.reminder_date);
        Ok(rows)
    }

    async fn discard_unread_reminders(&self, recurring_id: Uuid) -> ResultEngine<u64> {
        let mut rows = self.reminders.write().await;
        let before = rows.len();
        rows.retain(|_, r| r.recurring_id != recurring_id || r.is_read);
        Ok((before - rows.len()) as u64)
    }

    async fn reminder(&self, reminder_id: Uuid) -> ResultEngine<Reminder> {
        self.reminders
            .read()
            .await
            .get(&reminder_id)
            .cloned()
            .ok_or_else(|| EngineError::KeyNotFound("reminder not exists".to_string()))
    }

    async fn mark_reminder_read(
        &self,
        reminder_id: Uuid,
        at: DateTime<Utc>,
    ) -> ResultEngine<Reminder> {
        let mut rows = self.reminders.write().await;
        let reminder = rows
            .get_mut(&reminder_id)
            .ok_or_else(|| EngineError::KeyNotFound("reminder not exists".to_string()))?;
        if !reminder.is_read {
            reminder.is_read = true;
            reminder.read_at = Some(at);
        }
        Ok(reminder.clone())
    }
}
