use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::{
    EngineError, NewRecurringCmd, RecurringStatus, RecurringTransaction, ResultEngine,
    UpdateRecurringCmd,
    recurrence::Schedule,
    store::{AccountLookup, RecurringTransactionStore, ReminderStore},
    util::{apply_optional_text_patch, normalize_optional_text, normalize_required_name},
};

use super::{RecurringService, schedule_reminder};

fn ensure_end_after_start(
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
) -> ResultEngine<()> {
    if end_date.is_some_and(|end| end < start_date) {
        return Err(EngineError::InvalidSchedule(
            "end_date must not be before start_date".to_string(),
        ));
    }
    Ok(())
}

impl<S> RecurringService<S>
where
    S: AccountLookup + RecurringTransactionStore + ReminderStore,
{
    /// Creates a recurring transaction and computes its first `next_due`.
    pub async fn create(&self, cmd: NewRecurringCmd, now: DateTime<Utc>) -> ResultEngine<Uuid> {
        let name = normalize_required_name(&cmd.name, "recurring transaction")?;
        let schedule = Schedule {
            recur_type: cmd.recur_type,
            frequency: cmd.frequency,
            day_of_week: cmd.day_of_week,
            day_of_month: cmd.day_of_month,
            month_of_year: cmd.month_of_year,
        };
        schedule.validate()?;
        ensure_end_after_start(cmd.start_date, cmd.end_date)?;
        let account = self.store.account(cmd.account_id).await?;

        let next_due = schedule.next_due(now, cmd.start_date);
        let mut recurring = RecurringTransaction {
            id: Uuid::new_v4(),
            user_id: cmd.user_id,
            account_id: account.id,
            name,
            kind: cmd.kind,
            amount_minor: cmd.amount_minor,
            note: normalize_optional_text(cmd.note.as_deref()),
            start_date: cmd.start_date,
            end_date: cmd.end_date,
            recur_type: schedule.recur_type,
            frequency: schedule.frequency,
            day_of_week: schedule.day_of_week,
            day_of_month: schedule.day_of_month,
            month_of_year: schedule.month_of_year,
            status: RecurringStatus::Active,
            last_executed: None,
            next_due,
            created_at: now,
            updated_at: now,
        };
        if recurring.ends_before(next_due) {
            recurring.status = RecurringStatus::Completed;
        }

        self.store.insert_recurring(&recurring).await?;
        if recurring.status == RecurringStatus::Active {
            schedule_reminder(
                self.store.as_ref(),
                recurring.id,
                next_due,
                self.config.reminder_lead_time,
                now,
            )
            .await?;
        }
        info!(recurring_id = %recurring.id, %next_due, "recurring transaction created");
        Ok(recurring.id)
    }

    /// Edits a recurring transaction. Schedule changes recompute `next_due`
    /// and replace the unread reminders.
    ///
    /// Fails with `Conflict` if the processor or another edit changed the row
    /// after it was read; nothing is written then.
    pub async fn update(&self, cmd: UpdateRecurringCmd, now: DateTime<Utc>) -> ResultEngine<()> {
        let mut recurring = self.store.recurring(cmd.recurring_id).await?;
        let expected = recurring.version();
        if recurring.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "recurring transaction is {}",
                recurring.status.as_str()
            )));
        }

        if let Some(name) = cmd.name.as_deref() {
            recurring.name = normalize_required_name(name, "recurring transaction")?;
        }
        if let Some(kind) = cmd.kind {
            recurring.kind = kind;
        }
        if let Some(amount_minor) = cmd.amount_minor {
            recurring.amount_minor = amount_minor;
        }
        recurring.note = apply_optional_text_patch(recurring.note.take(), cmd.note.as_deref());
        if let Some(end_date) = cmd.end_date {
            recurring.end_date = end_date;
        }
        if let Some(recur_type) = cmd.recur_type {
            recurring.recur_type = recur_type;
        }
        if let Some(frequency) = cmd.frequency {
            recurring.frequency = frequency;
        }
        if let Some(day_of_week) = cmd.day_of_week {
            recurring.day_of_week = day_of_week;
        }
        if let Some(day_of_month) = cmd.day_of_month {
            recurring.day_of_month = day_of_month;
        }
        if let Some(month_of_year) = cmd.month_of_year {
            recurring.month_of_year = month_of_year;
        }
        ensure_end_after_start(recurring.start_date, recurring.end_date)?;

        let reschedule = cmd.touches_schedule();
        if reschedule {
            recurring.schedule().validate()?;
            recurring.next_due = recurring.schedule().next_due(now, recurring.start_date);
        }
        if recurring.ends_before(recurring.next_due) {
            recurring.status = RecurringStatus::Completed;
        }
        recurring.updated_at = now;
        self.store.update_recurring(&recurring, expected).await?;

        if reschedule {
            self.store.discard_unread_reminders(recurring.id).await?;
        }
        if reschedule && recurring.status == RecurringStatus::Active {
            schedule_reminder(
                self.store.as_ref(),
                recurring.id,
                recurring.next_due,
                self.config.reminder_lead_time,
                now,
            )
            .await?;
        }
        Ok(())
    }

    /// Stops the processor from posting occurrences until resumed.
    pub async fn pause(&self, recurring_id: Uuid, now: DateTime<Utc>) -> ResultEngine<()> {
        let mut recurring = self.store.recurring(recurring_id).await?;
        let expected = recurring.version();
        if recurring.status != RecurringStatus::Active {
            return Err(EngineError::InvalidState(format!(
                "cannot pause a {} recurring transaction",
                recurring.status.as_str()
            )));
        }
        recurring.status = RecurringStatus::Paused;
        recurring.updated_at = now;
        self.store.update_recurring(&recurring, expected).await
    }

    /// Reactivates a paused recurring transaction.
    ///
    /// Occurrences missed while paused are not posted: a `next_due` in the
    /// past is recomputed from `now`.
    pub async fn resume(&self, recurring_id: Uuid, now: DateTime<Utc>) -> ResultEngine<()> {
        let mut recurring = self.store.recurring(recurring_id).await?;
        let expected = recurring.version();
        if recurring.status != RecurringStatus::Paused {
            return Err(EngineError::InvalidState(format!(
                "cannot resume a {} recurring transaction",
                recurring.status.as_str()
            )));
        }

        let rescheduled = recurring.next_due <= now;
        if rescheduled {
            recurring.next_due = recurring.schedule().next_due(now, recurring.start_date);
        }
        recurring.status = if recurring.ends_before(recurring.next_due) {
            RecurringStatus::Completed
        } else {
            RecurringStatus::Active
        };
        recurring.updated_at = now;
        self.store.update_recurring(&recurring, expected).await?;

        if rescheduled {
            self.store.discard_unread_reminders(recurring.id).await?;
        }
        if rescheduled && recurring.status == RecurringStatus::Active {
            schedule_reminder(
                self.store.as_ref(),
                recurring.id,
                recurring.next_due,
                self.config.reminder_lead_time,
                now,
            )
            .await?;
        }
        Ok(())
    }

    /// Soft delete. Reminders stay stored but are no longer reported as due.
    pub async fn cancel(&self, recurring_id: Uuid, now: DateTime<Utc>) -> ResultEngine<()> {
        self.store.cancel_recurring(recurring_id, now).await?;
        info!(%recurring_id, "recurring transaction cancelled");
        Ok(())
    }

    pub async fn get(&self, recurring_id: Uuid) -> ResultEngine<RecurringTransaction> {
        self.store.recurring(recurring_id).await
    }

    pub async fn list_for_user(&self, user_id: &str) -> ResultEngine<Vec<RecurringTransaction>> {
        self.store.recurring_for_user(user_id).await
    }

    /// When a schedule would fire next, without saving anything.
    pub fn preview_next_due(
        &self,
        schedule: &Schedule,
        start_date: DateTime<Utc>,
        reference: DateTime<Utc>,
    ) -> ResultEngine<DateTime<Utc>> {
        schedule.validate()?;
        Ok(schedule.next_due(reference, start_date))
    }
}
