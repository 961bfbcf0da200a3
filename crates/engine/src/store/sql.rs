//! sea-orm backed store.
//!
//! Ledger mutations run inside one database transaction. The relative
//! balance update (`balance_minor = balance_minor + delta`) takes the write
//! lock on the account row, so concurrent mutations of the same account
//! queue behind it and never lose an update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseConnection, DatabaseTransaction, JoinType, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Account, EngineError, ExecutionUpdate, LedgerEntry, RecurringStatus, RecurringTransaction,
    RecurringVersion, Reminder, ResultEngine, accounts, entries, recurring, reminders,
};

use super::{
    AccountLookup, EntryListFilter, EntryWrite, LedgerStore, RecurringTransactionStore,
    ReminderStore, WriteOutcome,
};

macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

#[derive(Debug, Clone)]
pub struct SqlStore {
    database: DatabaseConnection,
}

impl SqlStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }

    async fn add_to_balance(
        db_tx: &DatabaseTransaction,
        account_id: Uuid,
        balance_delta: i64,
    ) -> ResultEngine<()> {
        let mut update = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::BalanceMinor,
                Expr::col(accounts::Column::BalanceMinor).add(balance_delta),
            )
            .filter(accounts::Column::Id.eq(account_id.to_string()));
        // SQLite turns an overflowing integer sum into a float.
        if balance_delta > 0 {
            update = update.filter(accounts::Column::BalanceMinor.lte(i64::MAX - balance_delta));
        } else if balance_delta < 0 {
            update = update.filter(accounts::Column::BalanceMinor.gte(i64::MIN - balance_delta));
        }

        if update.exec(db_tx).await?.rows_affected == 0 {
            let exists = accounts::Entity::find_by_id(account_id.to_string())
                .one(db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::InvalidAmount("balance overflow".to_string()));
            }
            return Err(EngineError::KeyNotFound("account not exists".to_string()));
        }
        Ok(())
    }

    /// Loads the entry and checks the write is still based on current state.
    async fn guarded_entry(
        db_tx: &DatabaseTransaction,
        account_id: Uuid,
        entry_id: Uuid,
        expected_amount_minor: i64,
    ) -> ResultEngine<LedgerEntry> {
        let model = entries::Entity::find_by_id(entry_id.to_string())
            .filter(entries::Column::AccountId.eq(account_id.to_string()))
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("entry not exists".to_string()))?;
        let entry = LedgerEntry::try_from(model)?;
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

    /// Writes `entry` over the stored row unless it moved since it was read.
    async fn write_guarded(
        db_tx: &DatabaseTransaction,
        entry: &LedgerEntry,
        expected_amount_minor: i64,
    ) -> ResultEngine<()> {
        let updated = entries::Entity::update_many()
            .set(entries::ActiveModel::from(entry))
            .filter(entries::Column::Id.eq(entry.id.to_string()))
            .filter(entries::Column::AmountMinor.eq(expected_amount_minor))
            .filter(entries::Column::IsVoided.eq(false))
            .exec(db_tx)
            .await?;
        if updated.rows_affected == 0 {
            return Err(EngineError::Conflict(format!(
                "entry {} changed concurrently",
                entry.id
            )));
        }
        Ok(())
    }

    async fn recurring_exists(&self, recurring_id: Uuid) -> ResultEngine<bool> {
        Ok(recurring::Entity::find_by_id(recurring_id.to_string())
            .one(&self.database)
            .await?
            .is_some())
    }
}

#[async_trait]
impl AccountLookup for SqlStore {
    async fn account(&self, account_id: Uuid) -> ResultEngine<Account> {
        let model = accounts::Entity::find_by_id(account_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))?;
        Account::try_from(model)
    }
}

#[async_trait]
impl LedgerStore for SqlStore {
    async fn insert_account(&self, account: &Account) -> ResultEngine<()> {
        accounts::ActiveModel::from(account)
            .insert(&self.database)
            .await?;
        Ok(())
    }

    async fn apply_ledger_delta(
        &self,
        account_id: Uuid,
        write: EntryWrite,
        balance_delta: i64,
    ) -> ResultEngine<WriteOutcome> {
        with_tx!(self, |db_tx| {
            match write {
                EntryWrite::Insert(entry) => {
                    if entry.account_id != account_id {
                        return Err(EngineError::InvalidState(
                            "entry belongs to another account".to_string(),
                        ));
                    }
                    let existing = match entry.idempotency_key.as_deref() {
                        Some(key) => {
                            entries::Entity::find()
                                .filter(entries::Column::AccountId.eq(account_id.to_string()))
                                .filter(entries::Column::IdempotencyKey.eq(key))
                                .one(&db_tx)
                                .await?
                        }
                        None => None,
                    };
                    match existing {
                        Some(model) => {
                            Ok(WriteOutcome::Duplicate(LedgerEntry::try_from(model)?.id))
                        }
                        None => {
                            Self::add_to_balance(&db_tx, account_id, balance_delta).await?;
                            entries::ActiveModel::from(&entry).insert(&db_tx).await?;
                            Ok(WriteOutcome::Applied(entry.id))
                        }
                    }
                }
                EntryWrite::Update {
                    entry_id,
                    expected_amount_minor,
                    patch,
                    updated_at,
                } => {
                    Self::add_to_balance(&db_tx, account_id, balance_delta).await?;
                    let mut entry =
                        Self::guarded_entry(&db_tx, account_id, entry_id, expected_amount_minor)
                            .await?;
                    entry.apply_patch(&patch, updated_at);
                    Self::write_guarded(&db_tx, &entry, expected_amount_minor).await?;
                    Ok(WriteOutcome::Applied(entry_id))
                }
                EntryWrite::Void {
                    entry_id,
                    expected_amount_minor,
                    voided_at,
                } => {
                    Self::add_to_balance(&db_tx, account_id, balance_delta).await?;
                    let mut entry =
                        Self::guarded_entry(&db_tx, account_id, entry_id, expected_amount_minor)
                            .await?;
                    entry.is_voided = true;
                    entry.voided_at = Some(voided_at);
                    entry.updated_at = voided_at;
                    Self::write_guarded(&db_tx, &entry, expected_amount_minor).await?;
                    Ok(WriteOutcome::Applied(entry_id))
                }
            }
        })
    }

    async fn entry(&self, entry_id: Uuid) -> ResultEngine<LedgerEntry> {
        let model = entries::Entity::find_by_id(entry_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("entry not exists".to_string()))?;
        LedgerEntry::try_from(model)
    }

    async fn entries_for_account(
        &self,
        account_id: Uuid,
        filter: &EntryListFilter,
    ) -> ResultEngine<Vec<LedgerEntry>> {
        self.account(account_id).await?;

        let mut query =
            entries::Entity::find().filter(entries::Column::AccountId.eq(account_id.to_string()));
        if !filter.include_voided {
            query = query.filter(entries::Column::IsVoided.eq(false));
        }
        if let Some(from) = filter.from {
            query = query.filter(entries::Column::Date.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(entries::Column::Date.lt(to));
        }

        query
            .order_by_asc(entries::Column::Date)
            .order_by_asc(entries::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }

    async fn recompute_balance(&self, account_id: Uuid) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            // Touch the row first so concurrent writers wait for the rebuild.
            Self::add_to_balance(&db_tx, account_id, 0).await?;

            let amounts: Vec<i64> = entries::Entity::find()
                .select_only()
                .column(entries::Column::AmountMinor)
                .filter(entries::Column::AccountId.eq(account_id.to_string()))
                .filter(entries::Column::IsVoided.eq(false))
                .into_tuple()
                .all(&db_tx)
                .await?;
            let balance = amounts
                .into_iter()
                .try_fold(0_i64, i64::checked_add)
                .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;

            accounts::ActiveModel {
                id: ActiveValue::Set(account_id.to_string()),
                balance_minor: ActiveValue::Set(balance),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(balance)
        })
    }
}

#[async_trait]
impl RecurringTransactionStore for SqlStore {
    async fn insert_recurring(&self, recurring: &RecurringTransaction) -> ResultEngine<()> {
        recurring::ActiveModel::try_from(recurring)?
            .insert(&self.database)
            .await?;
        Ok(())
    }

    async fn recurring(&self, recurring_id: Uuid) -> ResultEngine<RecurringTransaction> {
        let model = recurring::Entity::find_by_id(recurring_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("recurring transaction not exists".to_string()))?;
        RecurringTransaction::try_from(model)
    }

    async fn recurring_for_user(&self, user_id: &str) -> ResultEngine<Vec<RecurringTransaction>> {
        recurring::Entity::find()
            .filter(recurring::Column::UserId.eq(user_id))
            .order_by_asc(recurring::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(RecurringTransaction::try_from)
            .collect()
    }

    async fn active_due_before(
        &self,
        before: DateTime<Utc>,
    ) -> ResultEngine<Vec<RecurringTransaction>> {
        recurring::Entity::find()
            .filter(recurring::Column::Status.eq(RecurringStatus::Active.as_str()))
            .filter(recurring::Column::NextDue.lte(before))
            .order_by_asc(recurring::Column::NextDue)
            .order_by_asc(recurring::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(RecurringTransaction::try_from)
            .collect()
    }

    async fn update_recurring(
        &self,
        recurring: &RecurringTransaction,
        expected: RecurringVersion,
    ) -> ResultEngine<()> {
        let updated = recurring::Entity::update_many()
            .set(recurring::ActiveModel::try_from(recurring)?)
            .filter(recurring::Column::Id.eq(recurring.id.to_string()))
            .filter(recurring::Column::Status.eq(expected.status.as_str()))
            .filter(recurring::Column::NextDue.eq(expected.next_due))
            .filter(recurring::Column::UpdatedAt.eq(expected.updated_at))
            .exec(&self.database)
            .await?;
        if updated.rows_affected == 0 {
            if !self.recurring_exists(recurring.id).await? {
                return Err(EngineError::KeyNotFound(
                    "recurring transaction not exists".to_string(),
                ));
            }
            return Err(EngineError::Conflict(format!(
                "recurring transaction {} changed concurrently",
                recurring.id
            )));
        }
        Ok(())
    }

    async fn update_execution_state(
        &self,
        recurring_id: Uuid,
        expected_next_due: DateTime<Utc>,
        update: ExecutionUpdate,
    ) -> ResultEngine<()> {
        let updated = recurring::Entity::update_many()
            .col_expr(
                recurring::Column::LastExecuted,
                Expr::value(Some(update.last_executed)),
            )
            .col_expr(recurring::Column::NextDue, Expr::value(update.next_due))
            .col_expr(recurring::Column::Status, Expr::value(update.status.as_str()))
            .col_expr(recurring::Column::UpdatedAt, Expr::value(update.last_executed))
            .filter(recurring::Column::Id.eq(recurring_id.to_string()))
            .filter(recurring::Column::Status.eq(RecurringStatus::Active.as_str()))
            .filter(recurring::Column::NextDue.eq(expected_next_due))
            .exec(&self.database)
            .await?;
        if updated.rows_affected == 0 {
            if !self.recurring_exists(recurring_id).await? {
                return Err(EngineError::KeyNotFound(
                    "recurring transaction not exists".to_string(),
                ));
            }
            return Err(EngineError::Conflict(format!(
                "recurring transaction {recurring_id} was rescheduled concurrently"
            )));
        }
        Ok(())
    }

    async fn cancel_recurring(&self, recurring_id: Uuid, at: DateTime<Utc>) -> ResultEngine<()> {
        let updated = recurring::Entity::update_many()
            .col_expr(
                recurring::Column::Status,
                Expr::value(RecurringStatus::Cancelled.as_str()),
            )
            .col_expr(recurring::Column::UpdatedAt, Expr::value(at))
            .filter(recurring::Column::Id.eq(recurring_id.to_string()))
            .filter(recurring::Column::Status.is_in([
                RecurringStatus::Active.as_str(),
                RecurringStatus::Paused.as_str(),
            ]))
            .exec(&self.database)
            .await?;
        if updated.rows_affected == 0 {
            let current = self.recurring(recurring_id).await?;
            return Err(EngineError::InvalidState(format!(
                "recurring transaction is already {}",
                current.status.as_str()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ReminderStore for SqlStore {
    async fn insert_reminder(&self, reminder: &Reminder) -> ResultEngine<()> {
        reminders::ActiveModel::from(reminder)
            .insert(&self.database)
            .await?;
        Ok(())
    }

    async fn reminders_for_recurring(&self, recurring_id: Uuid) -> ResultEngine<Vec<Reminder>> {
        reminders::Entity::find()
            .filter(reminders::Column::RecurringId.eq(recurring_id.to_string()))
            .order_by_asc(reminders::Column::ReminderDate)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Reminder::try_from)
            .collect()
    }

    async fn active_reminders_for_user_before(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> ResultEngine<Vec<Reminder>> {
        reminders::Entity::find()
            .join(JoinType::InnerJoin, reminders::Relation::Recurring.def())
            .filter(recurring::Column::UserId.eq(user_id))
            .filter(recurring::Column::Status.eq(RecurringStatus::Active.as_str()))
            .filter(reminders::Column::IsRead.eq(false))
            .filter(reminders::Column::ReminderDate.lte(before))
            .order_by_asc(reminders::Column::ReminderDate)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Reminder::try_from)
            .collect()
    }

    async fn discard_unread_reminders(&self, recurring_id: Uuid) -> ResultEngine<u64> {
        let deleted = reminders::Entity::delete_many()
            .filter(reminders::Column::RecurringId.eq(recurring_id.to_string()))
            .filter(reminders::Column::IsRead.eq(false))
            .exec(&self.database)
            .await?;
        Ok(deleted.rows_affected)
    }

    async fn reminder(&self, reminder_id: Uuid) -> ResultEngine<Reminder> {
        let model = reminders::Entity::find_by_id(reminder_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("reminder not exists".to_string()))?;
        Reminder::try_from(model)
    }

    async fn mark_reminder_read(
        &self,
        reminder_id: Uuid,
        at: DateTime<Utc>,
    ) -> ResultEngine<Reminder> {
        with_tx!(self, |db_tx| {
            reminders::Entity::update_many()
                .col_expr(reminders::Column::IsRead, Expr::value(true))
                .col_expr(reminders::Column::ReadAt, Expr::value(Some(at)))
                .filter(reminders::Column::Id.eq(reminder_id.to_string()))
                .filter(reminders::Column::IsRead.eq(false))
                .exec(&db_tx)
                .await?;
            let model = reminders::Entity::find_by_id(reminder_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("reminder not exists".to_string()))?;
            Reminder::try_from(model)
        })
    }
}
