//! Initial schema.
//!
//! - `accounts`: where money is kept, with the cached balance
//! - `ledger_entries`: append-only dated lines against one account
//! - `recurring_transactions`: schedules that post ledger entries
//! - `reminders`: lead-time notices for upcoming occurrences

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    UserId,
    Name,
    Currency,
    Status,
    BalanceMinor,
}

#[derive(Iden)]
enum LedgerEntries {
    Table,
    Id,
    AccountId,
    Date,
    Kind,
    Currency,
    AmountMinor,
    Note,
    IsAdjustment,
    AdjustedFrom,
    IsVoided,
    VoidedAt,
    IdempotencyKey,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum RecurringTransactions {
    Table,
    Id,
    UserId,
    AccountId,
    Name,
    Kind,
    AmountMinor,
    Note,
    StartDate,
    EndDate,
    RecurType,
    Frequency,
    DayOfWeek,
    DayOfMonth,
    MonthOfYear,
    Status,
    LastExecuted,
    NextDue,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Reminders {
    Table,
    Id,
    RecurringId,
    ReminderDate,
    IsRead,
    ReadAt,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::UserId).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::Currency)
                            .string()
                            .not_null()
                            .default("EUR"),
                    )
                    .col(
                        ColumnDef::new(Accounts::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Accounts::BalanceMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerEntries::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LedgerEntries::AccountId).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::Date).timestamp().not_null())
                    .col(ColumnDef::new(LedgerEntries::Kind).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::Currency).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::Note).string())
                    .col(
                        ColumnDef::new(LedgerEntries::IsAdjustment)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(LedgerEntries::AdjustedFrom).string())
                    .col(
                        ColumnDef::new(LedgerEntries::IsVoided)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(LedgerEntries::VoidedAt).timestamp())
                    .col(ColumnDef::new(LedgerEntries::IdempotencyKey).string())
                    .col(
                        ColumnDef::new(LedgerEntries::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ledger_entries-account_id")
                            .from(LedgerEntries::Table, LedgerEntries::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ledger_entries-adjusted_from")
                            .from(LedgerEntries::Table, LedgerEntries::AdjustedFrom)
                            .to(LedgerEntries::Table, LedgerEntries::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-account_id-date")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::AccountId)
                    .col(LedgerEntries::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx-ledger_entries-account_id-idempotency_key")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::AccountId)
                    .col(LedgerEntries::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RecurringTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecurringTransactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RecurringTransactions::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecurringTransactions::AccountId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecurringTransactions::Name).string().not_null())
                    .col(ColumnDef::new(RecurringTransactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(RecurringTransactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecurringTransactions::Note).string())
                    .col(
                        ColumnDef::new(RecurringTransactions::StartDate)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecurringTransactions::EndDate).timestamp())
                    .col(
                        ColumnDef::new(RecurringTransactions::RecurType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecurringTransactions::Frequency)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(RecurringTransactions::DayOfWeek).integer())
                    .col(ColumnDef::new(RecurringTransactions::DayOfMonth).integer())
                    .col(ColumnDef::new(RecurringTransactions::MonthOfYear).integer())
                    .col(
                        ColumnDef::new(RecurringTransactions::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(RecurringTransactions::LastExecuted).timestamp())
                    .col(
                        ColumnDef::new(RecurringTransactions::NextDue)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecurringTransactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecurringTransactions::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-recurring_transactions-account_id")
                            .from(RecurringTransactions::Table, RecurringTransactions::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-recurring_transactions-status-next_due")
                    .table(RecurringTransactions::Table)
                    .col(RecurringTransactions::Status)
                    .col(RecurringTransactions::NextDue)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-recurring_transactions-user_id")
                    .table(RecurringTransactions::Table)
                    .col(RecurringTransactions::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Reminders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reminders::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reminders::RecurringId).string().not_null())
                    .col(
                        ColumnDef::new(Reminders::ReminderDate)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reminders::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Reminders::ReadAt).timestamp())
                    .col(ColumnDef::new(Reminders::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-reminders-recurring_id")
                            .from(Reminders::Table, Reminders::RecurringId)
                            .to(RecurringTransactions::Table, RecurringTransactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-reminders-recurring_id")
                    .table(Reminders::Table)
                    .col(Reminders::RecurringId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reminders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecurringTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
