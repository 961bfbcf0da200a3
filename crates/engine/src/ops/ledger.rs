use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{
    Account, AdjustEntryCmd, CreateEntryCmd, EngineError, EntryPatch, LedgerEntry, ResultEngine,
    UpdateEntryCmd,
    store::{EntryListFilter, EntryWrite, LedgerStore, WriteOutcome},
    util::normalize_optional_text,
};

use super::LedgerService;

impl<S: LedgerStore> LedgerService<S> {
    /// Posts a new entry and adds its amount to the account balance.
    ///
    /// Zero amounts are accepted. The entry takes the account currency.
    pub async fn create_entry(&self, cmd: CreateEntryCmd, now: DateTime<Utc>) -> ResultEngine<Uuid> {
        Ok(self.post_entry(cmd, now).await?.entry_id())
    }

    /// Like [`create_entry`](Self::create_entry), but tells a fresh write
    /// from a repeated idempotency key.
    pub async fn post_entry(
        &self,
        cmd: CreateEntryCmd,
        now: DateTime<Utc>,
    ) -> ResultEngine<WriteOutcome> {
        let account = self.store.account(cmd.account_id).await?;
        let mut entry = LedgerEntry::new(
            account.id,
            cmd.date,
            cmd.kind,
            account.currency,
            cmd.amount_minor,
            normalize_optional_text(cmd.note.as_deref()),
            now,
        );
        entry.idempotency_key = cmd.idempotency_key;
        self.apply(account.id, EntryWrite::Insert(entry), cmd.amount_minor)
            .await
    }

    /// Edits an entry in place while it is inside the editable window.
    ///
    /// An amount change moves the balance by `new - old` only.
    pub async fn update_entry(&self, cmd: UpdateEntryCmd, now: DateTime<Utc>) -> ResultEngine<()> {
        let entry = self.store.entry(cmd.entry_id).await?;
        if entry.is_voided {
            return Err(EngineError::NotEditable(format!(
                "entry {} is voided",
                entry.id
            )));
        }
        if now - entry.created_at > self.config.editable_window {
            return Err(EngineError::NotEditable(format!(
                "entry {} is past its editable window",
                entry.id
            )));
        }

        let patch = EntryPatch {
            date: cmd.date,
            kind: cmd.kind,
            amount_minor: cmd.amount_minor,
            note: cmd.note,
        };
        if patch.is_empty() {
            return Ok(());
        }
        let delta = match patch.amount_minor {
            Some(new_amount) => new_amount
                .checked_sub(entry.amount_minor)
                .ok_or_else(|| EngineError::InvalidAmount("amount delta overflow".to_string()))?,
            None => 0,
        };

        let write = EntryWrite::Update {
            entry_id: entry.id,
            expected_amount_minor: entry.amount_minor,
            patch,
            updated_at: now,
        };
        match self.apply(entry.account_id, write, delta).await {
            // Voided between our read and the write.
            Err(EngineError::AlreadyVoided(id)) => {
                Err(EngineError::NotEditable(format!("entry {id} is voided")))
            }
            other => other.map(|_| ()),
        }
    }

    /// Voids an entry and removes its amount from the balance. Terminal.
    pub async fn void_entry(&self, entry_id: Uuid, now: DateTime<Utc>) -> ResultEngine<()> {
        let entry = self.store.entry(entry_id).await?;
        if entry.is_voided {
            return Err(EngineError::AlreadyVoided(entry_id.to_string()));
        }
        let delta = entry
            .amount_minor
            .checked_neg()
            .ok_or_else(|| EngineError::InvalidAmount("amount delta overflow".to_string()))?;

        let write = EntryWrite::Void {
            entry_id,
            expected_amount_minor: entry.amount_minor,
            voided_at: now,
        };
        self.apply(entry.account_id, write, delta).await?;
        Ok(())
    }

    /// Layers a correcting entry on top of `cmd.original_id`.
    ///
    /// The original is left untouched; the new entry's amount is added to
    /// `cmd.account_id`, which may differ from the original's account.
    pub async fn adjust_entry(&self, cmd: AdjustEntryCmd, now: DateTime<Utc>) -> ResultEngine<Uuid> {
        let original = self.store.entry(cmd.original_id).await?;
        let account = self.store.account(cmd.account_id).await?;

        let mut entry = LedgerEntry::new(
            account.id,
            cmd.date,
            cmd.kind,
            account.currency,
            cmd.amount_minor,
            normalize_optional_text(cmd.note.as_deref()),
            now,
        );
        entry.is_adjustment = true;
        entry.adjusted_from = Some(original.id);

        let outcome = self
            .apply(account.id, EntryWrite::Insert(entry), cmd.amount_minor)
            .await?;
        Ok(outcome.entry_id())
    }

    pub async fn entry(&self, entry_id: Uuid) -> ResultEngine<LedgerEntry> {
        self.store.entry(entry_id).await
    }

    pub async fn account(&self, account_id: Uuid) -> ResultEngine<Account> {
        self.store.account(account_id).await
    }

    pub async fn entries_for_account(
        &self,
        account_id: Uuid,
        filter: &EntryListFilter,
    ) -> ResultEngine<Vec<LedgerEntry>> {
        self.store.entries_for_account(account_id, filter).await
    }

    /// Rebuilds the cached balance from the live entries.
    pub async fn recompute_balance(&self, account_id: Uuid) -> ResultEngine<i64> {
        let balance = self.store.recompute_balance(account_id).await?;
        debug!(%account_id, balance, "balance recomputed");
        Ok(balance)
    }

    /// `true` when the cached balance equals the sum of the live entries.
    pub async fn verify_balance(&self, account_id: Uuid) -> ResultEngine<bool> {
        let account = self.store.account(account_id).await?;
        let entries = self
            .store
            .entries_for_account(account_id, &EntryListFilter::default())
            .await?;
        let expected = entries
            .iter()
            .try_fold(0_i64, |acc, entry| acc.checked_add(entry.live_amount_minor()))
            .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;
        Ok(account.balance_minor == expected)
    }

    async fn apply(
        &self,
        account_id: Uuid,
        write: EntryWrite,
        balance_delta: i64,
    ) -> ResultEngine<WriteOutcome> {
        let entry_id = write.entry_id();
        let outcome = self
            .store
            .apply_ledger_delta(account_id, write, balance_delta)
            .await?;
        match outcome {
            WriteOutcome::Applied(_) => {
                debug!(%account_id, %entry_id, balance_delta, "ledger delta applied");
            }
            WriteOutcome::Duplicate(existing) => {
                debug!(%account_id, %existing, "idempotency key already used, nothing applied");
            }
        }
        Ok(outcome)
    }
}
