//! Command structs for engine operations.
//!
//! These types group parameters for write operations (create/update/adjust
//! entries, create/update recurring transactions), keeping call sites
//! readable and avoiding long argument lists. Optional fields use `Option`
//! so "not provided" is distinct from "set to zero".

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{LedgerType, RecurType};

/// Create a ledger entry.
#[derive(Clone, Debug)]
pub struct CreateEntryCmd {
    pub account_id: Uuid,
    pub date: DateTime<Utc>,
    pub kind: LedgerType,
    pub amount_minor: i64,
    pub note: Option<String>,
    pub idempotency_key: Option<String>,
}

impl CreateEntryCmd {
    #[must_use]
    pub fn new(
        account_id: Uuid,
        date: DateTime<Utc>,
        kind: LedgerType,
        amount_minor: i64,
    ) -> Self {
        Self {
            account_id,
            date,
            kind,
            amount_minor,
            note: None,
            idempotency_key: None,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Update a ledger entry in place. Only provided fields change.
#[derive(Clone, Debug)]
pub struct UpdateEntryCmd {
    pub entry_id: Uuid,
    pub date: Option<DateTime<Utc>>,
    pub kind: Option<LedgerType>,
    pub amount_minor: Option<i64>,
    /// `Some("")` clears the note.
    pub note: Option<String>,
}

impl UpdateEntryCmd {
    #[must_use]
    pub fn new(entry_id: Uuid) -> Self {
        Self {
            entry_id,
            date: None,
            kind: None,
            amount_minor: None,
            note: None,
        }
    }

    #[must_use]
    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: LedgerType) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Layer a correcting entry on top of an existing one.
#[derive(Clone, Debug)]
pub struct AdjustEntryCmd {
    pub original_id: Uuid,
    pub account_id: Uuid,
    pub date: DateTime<Utc>,
    pub kind: LedgerType,
    pub amount_minor: i64,
    pub note: Option<String>,
}

impl AdjustEntryCmd {
    #[must_use]
    pub fn new(
        original_id: Uuid,
        account_id: Uuid,
        date: DateTime<Utc>,
        kind: LedgerType,
        amount_minor: i64,
    ) -> Self {
        Self {
            original_id,
            account_id,
            date,
            kind,
            amount_minor,
            note: None,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Create a recurring transaction.
#[derive(Clone, Debug)]
pub struct NewRecurringCmd {
    pub user_id: String,
    pub account_id: Uuid,
    pub name: String,
    pub kind: LedgerType,
    pub amount_minor: i64,
    pub note: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub recur_type: RecurType,
    pub frequency: u32,
    pub day_of_week: Option<u32>,
    pub day_of_month: Option<u32>,
    pub month_of_year: Option<u32>,
}

impl NewRecurringCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        account_id: Uuid,
        name: impl Into<String>,
        kind: LedgerType,
        amount_minor: i64,
        start_date: DateTime<Utc>,
        recur_type: RecurType,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            account_id,
            name: name.into(),
            kind,
            amount_minor,
            note: None,
            start_date,
            end_date: None,
            recur_type,
            frequency: 1,
            day_of_week: None,
            day_of_month: None,
            month_of_year: None,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    #[must_use]
    pub fn day_of_week(mut self, day: u32) -> Self {
        self.day_of_week = Some(day);
        self
    }

    #[must_use]
    pub fn day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    #[must_use]
    pub fn month_of_year(mut self, month: u32) -> Self {
        self.month_of_year = Some(month);
        self
    }
}

/// Edit a recurring transaction. Only provided fields change.
///
/// Schedule anchors are `Option<Option<_>>`: `Some(None)` removes the
/// anchor, `None` leaves it untouched.
#[derive(Clone, Debug)]
pub struct UpdateRecurringCmd {
    pub recurring_id: Uuid,
    pub name: Option<String>,
    pub kind: Option<LedgerType>,
    pub amount_minor: Option<i64>,
    pub note: Option<String>,
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub recur_type: Option<RecurType>,
    pub frequency: Option<u32>,
    pub day_of_week: Option<Option<u32>>,
    pub day_of_month: Option<Option<u32>>,
    pub month_of_year: Option<Option<u32>>,
}

impl UpdateRecurringCmd {
    #[must_use]
    pub fn new(recurring_id: Uuid) -> Self {
        Self {
            recurring_id,
            name: None,
            kind: None,
            amount_minor: None,
            note: None,
            end_date: None,
            recur_type: None,
            frequency: None,
            day_of_week: None,
            day_of_month: None,
            month_of_year: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: LedgerType) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn end_date(mut self, end_date: Option<DateTime<Utc>>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn recur_type(mut self, recur_type: RecurType) -> Self {
        self.recur_type = Some(recur_type);
        self
    }

    #[must_use]
    pub fn frequency(mut self, frequency: u32) -> Self {
        self.frequency = Some(frequency);
        self
    }

    #[must_use]
    pub fn day_of_week(mut self, day: Option<u32>) -> Self {
        self.day_of_week = Some(day);
        self
    }

    #[must_use]
    pub fn day_of_month(mut self, day: Option<u32>) -> Self {
        self.day_of_month = Some(day);
        self
    }

    #[must_use]
    pub fn month_of_year(mut self, month: Option<u32>) -> Self {
        self.month_of_year = Some(month);
        self
    }

    pub(crate) fn touches_schedule(&self) -> bool {
        self.recur_type.is_some()
            || self.frequency.is_some()
            || self.day_of_week.is_some()
            || self.day_of_month.is_some()
            || self.month_of_year.is_some()
    }
}
