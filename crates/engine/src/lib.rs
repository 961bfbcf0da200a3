//! Personal ledger engine.
//!
//! Accounts hold a cached balance that always equals the sum of their live
//! ledger entries. [`LedgerService`] is the only way to change it: create,
//! update (inside the editable window), void and adjust all reduce to one
//! atomic store call that writes the entry and applies the balance delta
//! together.
//!
//! Recurring transactions are schedules that [`RecurrenceProcessor`] turns
//! into ledger entries on a timer, using the pure calculator in
//! [`recurrence`] to find each next occurrence.

pub use accounts::{Account, AccountStatus};
pub use commands::{
    AdjustEntryCmd, CreateEntryCmd, NewRecurringCmd, UpdateEntryCmd, UpdateRecurringCmd,
};
pub use config::{EngineConfig, ProcessorConfig};
pub use currency::Currency;
pub use entries::{EntryPatch, LedgerEntry, LedgerType};
pub use error::EngineError;
pub use ops::{LedgerService, RecurringService, ServiceBuilder};
pub use processor::{RecurrenceProcessor, TickReport};
pub use recurrence::Schedule;
pub use recurring::{
    ExecutionUpdate, RecurType, RecurringStatus, RecurringTransaction, RecurringVersion,
};
pub use reminders::Reminder;
pub use tokio_util::sync::CancellationToken;

mod accounts;
mod commands;
mod config;
mod currency;
mod entries;
mod error;
mod ops;
mod processor;
pub mod recurrence;
mod recurring;
mod reminders;
pub mod store;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
