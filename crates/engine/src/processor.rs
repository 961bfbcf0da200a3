//! The periodic job that turns due recurring transactions into ledger
//! entries.
//!
//! Each due row goes through the same steps: post the entry, compute the
//! next occurrence, reschedule (or complete) the row, then schedule its
//! reminder. Rows are independent: a failure is logged, counted and the
//! batch moves on. The row stays due and is retried on the next tick.
//!
//! Re-running a row whose post committed but whose reschedule did not is
//! safe: the entry carries an idempotency key derived from the row id and
//! the `next_due` being served, so the second post is a no-op.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::{
    sync::Mutex,
    time::{MissedTickBehavior, interval, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    CreateEntryCmd, EngineError, ExecutionUpdate, LedgerService, ProcessorConfig,
    RecurringStatus, RecurringTransaction, ResultEngine,
    ops::schedule_reminder,
    store::{LedgerStore, RecurringTransactionStore, ReminderStore, WriteOutcome},
};

/// What a tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    /// Entries written by this tick.
    pub posted: usize,
    /// Occurrences whose entry already existed from an earlier attempt.
    pub already_posted: usize,
    pub rescheduled: usize,
    pub completed: usize,
    pub reminders: usize,
    pub failed: Vec<Uuid>,
    /// Due rows left untouched because the tick was cancelled.
    pub skipped_cancelled: usize,
}

enum Executed {
    Rescheduled { reminder: bool },
    Completed,
}

/// Key that makes posting one occurrence at most once.
fn occurrence_key(recurring: &RecurringTransaction) -> String {
    format!(
        "recurring:{}:{}",
        recurring.id,
        recurring.next_due.to_rfc3339()
    )
}

fn annotated_note(recurring: &RecurringTransaction) -> String {
    match recurring.note.as_deref() {
        Some(note) => format!("{note} (recurring: {})", recurring.name),
        None => format!("recurring: {}", recurring.name),
    }
}

pub struct RecurrenceProcessor<S> {
    ledger: LedgerService<S>,
    config: ProcessorConfig,
    running: Mutex<()>,
}

impl<S> RecurrenceProcessor<S>
where
    S: LedgerStore + RecurringTransactionStore + ReminderStore,
{
    pub fn new(ledger: LedgerService<S>, config: ProcessorConfig) -> Self {
        Self {
            ledger,
            config,
            running: Mutex::new(()),
        }
    }

    fn store(&self) -> &Arc<S> {
        self.ledger.store()
    }

    /// Processes every active recurring transaction due at `now`.
    pub async fn process_due_transactions(&self, now: DateTime<Utc>) -> ResultEngine<TickReport> {
        self.process_due_transactions_until(now, &CancellationToken::new())
            .await
    }

    /// Same as [`process_due_transactions`](Self::process_due_transactions),
    /// checking `cancel` before each recurring transaction.
    pub async fn process_due_transactions_until(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> ResultEngine<TickReport> {
        let due = self.store().active_due_before(now).await?;
        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };

        for (position, recurring) in due.iter().enumerate() {
            if cancel.is_cancelled() {
                report.skipped_cancelled = due.len() - position;
                info!(
                    skipped = report.skipped_cancelled,
                    "tick cancelled, remaining recurring transactions left due"
                );
                break;
            }

            match self.execute(recurring, now, &mut report).await {
                Ok(Executed::Rescheduled { reminder }) => {
                    report.rescheduled += 1;
                    if reminder {
                        report.reminders += 1;
                    }
                }
                Ok(Executed::Completed) => {
                    report.completed += 1;
                }
                Err(err) => {
                    error!(
                        recurring_id = %recurring.id,
                        account_id = %recurring.account_id,
                        "recurring transaction failed: {err}"
                    );
                    report.failed.push(recurring.id);
                }
            }
        }
        Ok(report)
    }

    async fn execute(
        &self,
        recurring: &RecurringTransaction,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> ResultEngine<Executed> {
        let cmd = CreateEntryCmd::new(
            recurring.account_id,
            now,
            recurring.kind,
            recurring.amount_minor,
        )
        .note(annotated_note(recurring))
        .idempotency_key(occurrence_key(recurring));

        match self.ledger.post_entry(cmd, now).await {
            Ok(WriteOutcome::Applied(entry_id)) => {
                debug!(recurring_id = %recurring.id, %entry_id, "occurrence posted");
                report.posted += 1;
            }
            Ok(WriteOutcome::Duplicate(entry_id)) => {
                warn!(
                    recurring_id = %recurring.id,
                    %entry_id,
                    "occurrence was already posted, rescheduling only"
                );
                report.already_posted += 1;
            }
            Err(err) => {
                return Err(EngineError::Scheduling(format!("posting failed: {err}")));
            }
        }

        let next_due = recurring.schedule().next_due(now, recurring.next_due);
        let status = if recurring.ends_before(next_due) {
            RecurringStatus::Completed
        } else {
            RecurringStatus::Active
        };
        let update = ExecutionUpdate {
            last_executed: now,
            next_due,
            status,
        };
        self.store()
            .update_execution_state(recurring.id, recurring.next_due, update)
            .await
            .map_err(|err| EngineError::Scheduling(format!("rescheduling failed: {err}")))?;

        if status == RecurringStatus::Completed {
            info!(recurring_id = %recurring.id, "recurring transaction completed");
            return Ok(Executed::Completed);
        }

        // The reschedule is committed; a lost reminder is not worth failing
        // the row for.
        let reminder = match schedule_reminder(
            self.store().as_ref(),
            recurring.id,
            next_due,
            self.ledger.config().reminder_lead_time,
            now,
        )
        .await
        {
            Ok(reminder) => reminder.is_some(),
            Err(err) => {
                warn!(recurring_id = %recurring.id, "reminder not scheduled: {err}");
                false
            }
        };
        Ok(Executed::Rescheduled { reminder })
    }

    /// Runs one bounded tick unless another one is still in flight.
    ///
    /// Returns `None` when the tick was skipped, failed or timed out.
    pub async fn tick(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> Option<TickReport> {
        let Ok(_running) = self.running.try_lock() else {
            warn!("previous tick still running, skipping");
            return None;
        };

        match timeout(
            self.config.tick_timeout,
            self.process_due_transactions_until(now, cancel),
        )
        .await
        {
            Ok(Ok(report)) => {
                info!(
                    due = report.due,
                    posted = report.posted,
                    rescheduled = report.rescheduled,
                    completed = report.completed,
                    reminders = report.reminders,
                    failed = report.failed.len(),
                    "tick finished"
                );
                Some(report)
            }
            Ok(Err(err)) => {
                error!("tick failed: {err}");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.config.tick_timeout, "tick timed out");
                None
            }
        }
    }

    /// Ticks every `interval` until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?self.config.interval, "recurrence processor started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(Utc::now(), &cancel).await;
                }
            }
        }
        info!("recurrence processor stopped");
    }
}
