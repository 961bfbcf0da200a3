use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{
    Reminder, ResultEngine,
    store::{RecurringTransactionStore, ReminderStore},
};

use super::RecurringService;

/// Creates the reminder for an occurrence due at `next_due`, unless its date
/// (`next_due - lead_time`) is not after `now`.
pub(crate) async fn schedule_reminder<S: ReminderStore + ?Sized>(
    store: &S,
    recurring_id: Uuid,
    next_due: DateTime<Utc>,
    lead_time: TimeDelta,
    now: DateTime<Utc>,
) -> ResultEngine<Option<Reminder>> {
    let Some(reminder_date) = next_due.checked_sub_signed(lead_time) else {
        return Ok(None);
    };
    if reminder_date <= now {
        debug!(%recurring_id, %reminder_date, "reminder date already passed, not scheduled");
        return Ok(None);
    }
    let reminder = Reminder::new(recurring_id, reminder_date, now);
    store.insert_reminder(&reminder).await?;
    Ok(Some(reminder))
}

impl<S: RecurringTransactionStore + ReminderStore> RecurringService<S> {
    /// Every reminder of a recurring transaction, oldest first.
    pub async fn reminders_for(&self, recurring_id: Uuid) -> ResultEngine<Vec<Reminder>> {
        self.store.recurring(recurring_id).await?;
        self.store.reminders_for_recurring(recurring_id).await
    }

    /// Unread reminders of `user_id` dated at or before `before`.
    pub async fn due_reminders(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> ResultEngine<Vec<Reminder>> {
        self.store
            .active_reminders_for_user_before(user_id, before)
            .await
    }

    /// Marks a reminder as read. Marking it again keeps the first `read_at`.
    pub async fn mark_reminder_read(
        &self,
        reminder_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Reminder> {
        self.store.mark_reminder_read(reminder_id, now).await
    }
}
