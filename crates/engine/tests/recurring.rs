use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sea_orm::Database;

use engine::{
    Account, CancellationToken, CreateEntryCmd, Currency, EngineConfig, EngineError,
    ExecutionUpdate, LedgerService, LedgerType, NewRecurringCmd, ProcessorConfig, RecurType,
    RecurrenceProcessor, RecurringService, RecurringStatus, Schedule, UpdateRecurringCmd,
    store::{
        EntryListFilter, LedgerStore, MemoryStore, RecurringTransactionStore, ReminderStore,
        SqlStore,
    },
};
use migration::MigratorTrait;
use uuid::Uuid;

trait Store: LedgerStore + RecurringTransactionStore + ReminderStore + 'static {}
impl<S: LedgerStore + RecurringTransactionStore + ReminderStore + 'static> Store for S {}

struct Harness<S> {
    store: Arc<S>,
    ledger: LedgerService<S>,
    recurring: RecurringService<S>,
    processor: RecurrenceProcessor<S>,
}

fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, hour, 0, 0).unwrap()
}

async fn sql_store() -> Arc<SqlStore> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Arc::new(SqlStore::new(db))
}

fn harness<S: Store>(store: Arc<S>) -> Harness<S> {
    let config = EngineConfig::default();
    let ledger = LedgerService::builder()
        .store(Arc::clone(&store))
        .config(config)
        .build_ledger()
        .unwrap();
    let recurring = RecurringService::builder()
        .store(Arc::clone(&store))
        .config(config)
        .build_recurring()
        .unwrap();
    let processor = RecurrenceProcessor::new(ledger.clone(), ProcessorConfig::default());
    Harness {
        store,
        ledger,
        recurring,
        processor,
    }
}

async fn account<S: Store>(h: &Harness<S>, name: &str) -> Account {
    let account = Account::new("alice", name, Currency::Eur);
    h.store.insert_account(&account).await.unwrap();
    account
}

async fn live_entries<S: Store>(h: &Harness<S>, account: &Account) -> Vec<engine::LedgerEntry> {
    h.ledger
        .entries_for_account(account.id, &EntryListFilter::default())
        .await
        .unwrap()
}

async fn processor_posts_and_reschedules<S: Store>(store: Arc<S>) {
    let h = harness(store);
    let checking = account(&h, "Checking").await;
    let created = at(1, 10, 9);
    let start = at(2, 1, 9);

    let id = h
        .recurring
        .create(
            NewRecurringCmd::new(
                "alice",
                checking.id,
                "Rent",
                LedgerType::Expense,
                -90_000,
                start,
                RecurType::Monthly,
            )
            .note("flat")
            .day_of_month(1),
            created,
        )
        .await
        .unwrap();
    assert_eq!(h.recurring.get(id).await.unwrap().next_due, start);

    let now = at(2, 1, 10);
    let report = h.processor.process_due_transactions(now).await.unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.posted, 1);
    assert_eq!(report.rescheduled, 1);
    assert_eq!(report.reminders, 1);
    assert!(report.failed.is_empty());

    let entries = live_entries(&h, &checking).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount_minor, -90_000);
    assert_eq!(entries[0].date, now);
    assert_eq!(entries[0].note.as_deref(), Some("flat (recurring: Rent)"));
    assert_eq!(h.ledger.account(checking.id).await.unwrap().balance_minor, -90_000);

    let row = h.recurring.get(id).await.unwrap();
    assert_eq!(row.last_executed, Some(now));
    assert_eq!(row.next_due, at(3, 1, 10));
    assert_eq!(row.status, RecurringStatus::Active);

    let reminders = h.recurring.reminders_for(id).await.unwrap();
    assert_eq!(
        reminders.last().unwrap().reminder_date,
        at(3, 1, 10) - TimeDelta::days(3)
    );

    // Nothing is due any more at the same instant.
    let again = h.processor.process_due_transactions(now).await.unwrap();
    assert_eq!(again.due, 0);
}

#[tokio::test]
async fn processor_posts_and_reschedules_memory() {
    processor_posts_and_reschedules(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn processor_posts_and_reschedules_sql() {
    processor_posts_and_reschedules(sql_store().await).await;
}

async fn batch_isolation<S: Store>(store: Arc<S>) {
    let h = harness(store);
    let first_account = account(&h, "First").await;
    let full_account = account(&h, "Full").await;
    let third_account = account(&h, "Third").await;
    let created = at(1, 1, 8);

    // Any further positive amount overflows this balance.
    h.ledger
        .create_entry(
            CreateEntryCmd::new(full_account.id, created, LedgerType::Balance, i64::MAX - 50),
            created,
        )
        .await
        .unwrap();

    let mut ids = Vec::new();
    for (hour, target) in [(9, &first_account), (10, &full_account), (11, &third_account)] {
        let id = h
            .recurring
            .create(
                NewRecurringCmd::new(
                    "alice",
                    target.id,
                    "Allowance",
                    LedgerType::Income,
                    100,
                    at(1, 5, hour),
                    RecurType::Weekly,
                ),
                created,
            )
            .await
            .unwrap();
        ids.push(id);
    }

    let now = at(1, 5, 12);
    let report = h.processor.process_due_transactions(now).await.unwrap();
    assert_eq!(report.due, 3);
    assert_eq!(report.posted, 2);
    assert_eq!(report.rescheduled, 2);
    assert_eq!(report.failed, vec![ids[1]]);

    assert_eq!(live_entries(&h, &first_account).await.len(), 1);
    assert_eq!(live_entries(&h, &third_account).await.len(), 1);
    assert_eq!(live_entries(&h, &full_account).await.len(), 1);

    assert_eq!(h.recurring.get(ids[0]).await.unwrap().next_due, at(1, 12, 12));
    assert_eq!(h.recurring.get(ids[2]).await.unwrap().next_due, at(1, 12, 12));
    let failed = h.recurring.get(ids[1]).await.unwrap();
    assert_eq!(failed.next_due, at(1, 5, 10));
    assert_eq!(failed.last_executed, None);
}

#[tokio::test]
async fn batch_isolation_memory() {
    batch_isolation(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn batch_isolation_sql() {
    batch_isolation(sql_store().await).await;
}

async fn repost_after_crash_is_a_no_op<S: Store>(store: Arc<S>) {
    let h = harness(store);
    let checking = account(&h, "Checking").await;
    let start = at(4, 1, 9);
    let id = h
        .recurring
        .create(
            NewRecurringCmd::new(
                "alice",
                checking.id,
                "Gym",
                LedgerType::Expense,
                -3_000,
                start,
                RecurType::Monthly,
            ),
            at(3, 1, 9),
        )
        .await
        .unwrap();

    // The entry of this occurrence committed, the reschedule did not.
    let now = at(4, 1, 10);
    h.ledger
        .create_entry(
            CreateEntryCmd::new(checking.id, now, LedgerType::Expense, -3_000)
                .idempotency_key(format!("recurring:{id}:{}", start.to_rfc3339())),
            now,
        )
        .await
        .unwrap();

    let report = h.processor.process_due_transactions(now).await.unwrap();
    assert_eq!(report.posted, 0);
    assert_eq!(report.already_posted, 1);
    assert_eq!(report.rescheduled, 1);
    assert_eq!(live_entries(&h, &checking).await.len(), 1);
    assert_eq!(h.ledger.account(checking.id).await.unwrap().balance_minor, -3_000);
    assert_eq!(h.recurring.get(id).await.unwrap().next_due, at(5, 1, 10));
}

#[tokio::test]
async fn repost_after_crash_is_a_no_op_memory() {
    repost_after_crash_is_a_no_op(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn repost_after_crash_is_a_no_op_sql() {
    repost_after_crash_is_a_no_op(sql_store().await).await;
}

async fn completes_past_end_date<S: Store>(store: Arc<S>) {
    let h = harness(store);
    let checking = account(&h, "Checking").await;
    let start = at(6, 1, 9);
    let id = h
        .recurring
        .create(
            NewRecurringCmd::new(
                "alice",
                checking.id,
                "Course",
                LedgerType::Expense,
                -12_000,
                start,
                RecurType::Monthly,
            )
            .end_date(at(6, 20, 0)),
            at(5, 1, 9),
        )
        .await
        .unwrap();
    let reminders_before = h.recurring.reminders_for(id).await.unwrap().len();

    let now = at(6, 1, 9);
    let report = h.processor.process_due_transactions(now).await.unwrap();
    assert_eq!(report.posted, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(report.rescheduled, 0);

    let row = h.recurring.get(id).await.unwrap();
    assert_eq!(row.status, RecurringStatus::Completed);
    assert_eq!(row.last_executed, Some(now));
    assert_eq!(
        h.recurring.reminders_for(id).await.unwrap().len(),
        reminders_before
    );

    let later = h
        .processor
        .process_due_transactions(at(12, 1, 9))
        .await
        .unwrap();
    assert_eq!(later.due, 0);

    let err = h
        .recurring
        .update(UpdateRecurringCmd::new(id).amount_minor(-1), at(6, 2, 9))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn completes_past_end_date_memory() {
    completes_past_end_date(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn completes_past_end_date_sql() {
    completes_past_end_date(sql_store().await).await;
}

async fn cancellation_leaves_rows_due<S: Store>(store: Arc<S>) {
    let h = harness(store);
    let checking = account(&h, "Checking").await;
    let mut ids = Vec::new();
    for day in [2, 3] {
        let id = h
            .recurring
            .create(
                NewRecurringCmd::new(
                    "alice",
                    checking.id,
                    "Savings",
                    LedgerType::Transfer,
                    -500,
                    at(7, day, 9),
                    RecurType::Daily,
                ),
                at(7, 1, 9),
            )
            .await
            .unwrap();
        ids.push(id);
    }

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = h
        .processor
        .process_due_transactions_until(at(7, 4, 9), &cancel)
        .await
        .unwrap();
    assert_eq!(report.due, 2);
    assert_eq!(report.skipped_cancelled, 2);
    assert_eq!(report.posted, 0);
    assert!(live_entries(&h, &checking).await.is_empty());
    assert_eq!(h.recurring.get(ids[0]).await.unwrap().next_due, at(7, 2, 9));
    assert_eq!(h.recurring.get(ids[1]).await.unwrap().next_due, at(7, 3, 9));

    // Picked up again by the next tick.
    let report = h
        .processor
        .process_due_transactions(at(7, 4, 9))
        .await
        .unwrap();
    assert_eq!(report.posted, 2);
}

#[tokio::test]
async fn cancellation_leaves_rows_due_memory() {
    cancellation_leaves_rows_due(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn cancellation_leaves_rows_due_sql() {
    cancellation_leaves_rows_due(sql_store().await).await;
}

async fn lifecycle<S: Store>(store: Arc<S>) {
    let h = harness(store);
    let checking = account(&h, "Checking").await;
    let created = at(8, 1, 9);
    let id = h
        .recurring
        .create(
            NewRecurringCmd::new(
                "alice",
                checking.id,
                "Streaming",
                LedgerType::Expense,
                -1_299,
                at(8, 5, 9),
                RecurType::Monthly,
            ),
            created,
        )
        .await
        .unwrap();

    h.recurring.pause(id, at(8, 2, 9)).await.unwrap();
    let report = h
        .processor
        .process_due_transactions(at(8, 10, 9))
        .await
        .unwrap();
    assert_eq!(report.due, 0);

    let err = h.recurring.pause(id, at(8, 10, 9)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    // Missed occurrences are skipped: next_due restarts from the resume time.
    h.recurring.resume(id, at(8, 10, 9)).await.unwrap();
    let row = h.recurring.get(id).await.unwrap();
    assert_eq!(row.status, RecurringStatus::Active);
    assert_eq!(row.next_due, at(9, 10, 9));

    h.recurring
        .update(
            UpdateRecurringCmd::new(id)
                .name("Streaming+")
                .amount_minor(-1_599)
                .recur_type(RecurType::Weekly),
            at(8, 11, 9),
        )
        .await
        .unwrap();
    let row = h.recurring.get(id).await.unwrap();
    assert_eq!(row.name, "Streaming+");
    assert_eq!(row.amount_minor, -1_599);
    assert_eq!(row.next_due, at(8, 18, 9));

    h.recurring.cancel(id, at(8, 12, 9)).await.unwrap();
    assert_eq!(
        h.recurring.get(id).await.unwrap().status,
        RecurringStatus::Cancelled
    );
    let err = h.recurring.cancel(id, at(8, 12, 9)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    let err = h.recurring.resume(id, at(8, 12, 9)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let listed = h.recurring.list_for_user("alice").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(h.recurring.list_for_user("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn lifecycle_memory() {
    lifecycle(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn lifecycle_sql() {
    lifecycle(sql_store().await).await;
}

async fn reminders_flow<S: Store>(store: Arc<S>) {
    let h = harness(store);
    let checking = account(&h, "Checking").await;
    let created = at(9, 1, 9);
    let id = h
        .recurring
        .create(
            NewRecurringCmd::new(
                "alice",
                checking.id,
                "Insurance",
                LedgerType::Expense,
                -40_000,
                at(9, 20, 9),
                RecurType::Yearly,
            ),
            created,
        )
        .await
        .unwrap();

    let reminders = h.recurring.reminders_for(id).await.unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].reminder_date, at(9, 17, 9));

    assert!(
        h.recurring
            .due_reminders("alice", at(9, 16, 9))
            .await
            .unwrap()
            .is_empty()
    );
    let due = h
        .recurring
        .due_reminders("alice", at(9, 17, 9))
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert!(
        h.recurring
            .due_reminders("bob", at(9, 17, 9))
            .await
            .unwrap()
            .is_empty()
    );

    let read = h
        .recurring
        .mark_reminder_read(due[0].id, at(9, 17, 12))
        .await
        .unwrap();
    assert!(read.is_read);
    assert_eq!(read.read_at, Some(at(9, 17, 12)));
    let again = h
        .recurring
        .mark_reminder_read(due[0].id, at(9, 18, 12))
        .await
        .unwrap();
    assert_eq!(again.read_at, Some(at(9, 17, 12)));
    assert!(
        h.recurring
            .due_reminders("alice", at(9, 19, 9))
            .await
            .unwrap()
            .is_empty()
    );

    let err = h
        .recurring
        .mark_reminder_read(Uuid::new_v4(), at(9, 18, 12))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("reminder not exists".to_string()));
}

#[tokio::test]
async fn reminders_flow_memory() {
    reminders_flow(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn reminders_flow_sql() {
    reminders_flow(sql_store().await).await;
}

async fn reschedule_guard<S: Store>(store: Arc<S>) {
    let h = harness(store);
    let checking = account(&h, "Checking").await;
    let start = at(10, 2, 9);
    let id = h
        .recurring
        .create(
            NewRecurringCmd::new(
                "alice",
                checking.id,
                "Water",
                LedgerType::Expense,
                -2_000,
                start,
                RecurType::Quarterly,
            ),
            at(10, 1, 9),
        )
        .await
        .unwrap();

    let update = ExecutionUpdate {
        last_executed: at(10, 2, 10),
        next_due: at(12, 2, 10),
        status: RecurringStatus::Active,
    };
    let err = h
        .store
        .update_execution_state(id, start - TimeDelta::days(1), update)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert_eq!(h.recurring.get(id).await.unwrap().next_due, start);

    h.store
        .update_execution_state(id, start, update)
        .await
        .unwrap();
    let row = h.recurring.get(id).await.unwrap();
    assert_eq!(row.next_due, at(12, 2, 10));
    assert_eq!(row.last_executed, Some(at(10, 2, 10)));
}

#[tokio::test]
async fn reschedule_guard_memory() {
    reschedule_guard(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn reschedule_guard_sql() {
    reschedule_guard(sql_store().await).await;
}

#[tokio::test]
async fn create_validates_input() {
    let h = harness(Arc::new(MemoryStore::new()));
    let checking = account(&h, "Checking").await;
    let now = at(11, 1, 9);
    let base = || {
        NewRecurringCmd::new(
            "alice",
            checking.id,
            "Rent",
            LedgerType::Expense,
            -90_000,
            at(11, 5, 9),
            RecurType::Weekly,
        )
    };

    let err = h.recurring.create(base().frequency(0), now).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidSchedule(_)));

    let err = h.recurring.create(base().day_of_week(7), now).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidSchedule(_)));

    let err = h
        .recurring
        .create(base().end_date(at(11, 4, 9)), now)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSchedule(_)));

    let mut unknown_account = base();
    unknown_account.account_id = Uuid::new_v4();
    let err = h.recurring.create(unknown_account, now).await.unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("account not exists".to_string()));

    let mut blank = base();
    blank.name = "   ".to_string();
    let err = h.recurring.create(blank, now).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidSchedule("recurring transaction name must not be empty".to_string())
    );

    assert!(h.recurring.list_for_user("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn preview_matches_weekly_anchor() {
    let h = harness(Arc::new(MemoryStore::new()));
    // 2024-01-03 is a Wednesday.
    let wednesday = at(1, 3, 9);
    let schedule = Schedule::new(RecurType::Weekly, 1).day_of_week(3);

    let next = h
        .recurring
        .preview_next_due(&schedule, at(1, 1, 9), wednesday)
        .unwrap();
    assert_eq!(next, at(1, 10, 9));

    let err = h
        .recurring
        .preview_next_due(&Schedule::new(RecurType::Weekly, 0), at(1, 1, 9), wednesday)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSchedule(_)));
}

async fn stale_edit_does_not_undo_a_reschedule<S: Store>(store: Arc<S>) {
    let h = harness(store);
    let checking = account(&h, "Checking").await;
    let start = at(1, 10, 9);
    let id = h
        .recurring
        .create(
            NewRecurringCmd::new(
                "alice",
                checking.id,
                "Rent",
                LedgerType::Expense,
                -90_000,
                start,
                RecurType::Monthly,
            ),
            at(1, 1, 9),
        )
        .await
        .unwrap();

    // An edit reads the row, then the processor reschedules it before the
    // edit is written back.
    let read = h.recurring.get(id).await.unwrap();
    let report = h
        .processor
        .process_due_transactions(at(1, 10, 11))
        .await
        .unwrap();
    assert_eq!(report.rescheduled, 1);

    let mut edited = read.clone();
    edited.name = "Rent v2".to_string();
    edited.updated_at = at(1, 10, 12);
    let err = h
        .store
        .update_recurring(&edited, read.version())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert!(err.is_persistence_failure());

    let row = h.recurring.get(id).await.unwrap();
    assert_eq!(row.name, "Rent");
    assert_eq!(row.next_due, at(2, 10, 11));
    assert_eq!(row.last_executed, Some(at(1, 10, 11)));

    // Retrying through the service reads the fresh row and keeps the
    // execution state.
    h.recurring
        .update(UpdateRecurringCmd::new(id).name("Rent v2"), at(1, 10, 12))
        .await
        .unwrap();
    let row = h.recurring.get(id).await.unwrap();
    assert_eq!(row.name, "Rent v2");
    assert_eq!(row.next_due, at(2, 10, 11));
    assert_eq!(row.last_executed, Some(at(1, 10, 11)));

    let again = h
        .processor
        .process_due_transactions(at(1, 10, 13))
        .await
        .unwrap();
    assert_eq!(again.due, 0);
    assert_eq!(live_entries(&h, &checking).await.len(), 1);

    // Pause and resume are guarded the same way.
    let stale = h.recurring.get(id).await.unwrap();
    h.recurring.pause(id, at(1, 11, 9)).await.unwrap();
    let mut resumed = stale.clone();
    resumed.updated_at = at(1, 11, 10);
    let err = h
        .store
        .update_recurring(&resumed, stale.version())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert_eq!(
        h.recurring.get(id).await.unwrap().status,
        RecurringStatus::Paused
    );
}

#[tokio::test]
async fn stale_edit_does_not_undo_a_reschedule_memory() {
    stale_edit_does_not_undo_a_reschedule(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn stale_edit_does_not_undo_a_reschedule_sql() {
    stale_edit_does_not_undo_a_reschedule(sql_store().await).await;
}

async fn oversized_frequency_is_rejected<S: Store>(store: Arc<S>) {
    let h = harness(store);
    let checking = account(&h, "Checking").await;
    let cmd = NewRecurringCmd::new(
        "alice",
        checking.id,
        "Rare",
        LedgerType::Expense,
        -100,
        at(1, 10, 9),
        RecurType::Daily,
    );

    let err = h
        .recurring
        .create(cmd.clone().frequency(3_000_000_000), at(1, 1, 9))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSchedule(_)));
    assert!(h.recurring.list_for_user("alice").await.unwrap().is_empty());

    let id = h
        .recurring
        .create(cmd.frequency(i32::MAX as u32), at(1, 1, 9))
        .await
        .unwrap();
    assert_eq!(h.recurring.get(id).await.unwrap().frequency, i32::MAX as u32);

    let err = h
        .recurring
        .update(
            UpdateRecurringCmd::new(id).frequency(3_000_000_000),
            at(1, 2, 9),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSchedule(_)));
    assert_eq!(h.recurring.get(id).await.unwrap().frequency, i32::MAX as u32);
}

#[tokio::test]
async fn oversized_frequency_is_rejected_memory() {
    oversized_frequency_is_rejected(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn oversized_frequency_is_rejected_sql() {
    oversized_frequency_is_rejected(sql_store().await).await;
}

async fn stale_reminders_are_not_due<S: Store>(store: Arc<S>) {
    let h = harness(store);
    let checking = account(&h, "Checking").await;
    let id = h
        .recurring
        .create(
            NewRecurringCmd::new(
                "alice",
                checking.id,
                "Gym",
                LedgerType::Expense,
                -3_000,
                at(3, 1, 9),
                RecurType::Monthly,
            ),
            at(3, 1, 9),
        )
        .await
        .unwrap();
    let first = h.recurring.reminders_for(id).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].reminder_date, at(3, 29, 9));
    h.recurring
        .mark_reminder_read(first[0].id, at(3, 1, 10))
        .await
        .unwrap();

    // Moving the schedule replaces the unread reminder; read ones stay.
    h.recurring
        .update(
            UpdateRecurringCmd::new(id).recur_type(RecurType::Weekly),
            at(3, 2, 9),
        )
        .await
        .unwrap();
    assert_eq!(h.recurring.get(id).await.unwrap().next_due, at(3, 9, 9));
    let reminders = h.recurring.reminders_for(id).await.unwrap();
    let dates: Vec<_> = reminders.iter().map(|r| r.reminder_date).collect();
    assert_eq!(dates, vec![at(3, 6, 9), at(3, 29, 9)]);

    let due = h
        .recurring
        .due_reminders("alice", at(3, 30, 9))
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].reminder_date, at(3, 6, 9));

    // Reminders of a cancelled row are kept but never reported as due.
    h.recurring.cancel(id, at(3, 3, 9)).await.unwrap();
    assert!(
        h.recurring
            .due_reminders("alice", at(3, 30, 9))
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(h.recurring.reminders_for(id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn stale_reminders_are_not_due_memory() {
    stale_reminders_are_not_due(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn stale_reminders_are_not_due_sql() {
    stale_reminders_are_not_due(sql_store().await).await;
}
