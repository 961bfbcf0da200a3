//! Recurring transaction definitions and their execution state.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, LedgerType, ResultEngine,
    recurrence::Schedule,
    util::parse_uuid,
};

/// Shape of a schedule.
///
/// `Unrecognized` only appears when a row written by another tool carries a
/// tag this engine does not know; the calculator advances it by one month.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurType {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
    Custom,
    Unrecognized,
}

impl RecurType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Lenient parse for values read back from storage.
    pub fn from_stored(value: &str) -> Self {
        Self::try_from(value).unwrap_or(Self::Unrecognized)
    }
}

impl TryFrom<&str> for RecurType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "biweekly" => Ok(Self::Biweekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" => Ok(Self::Yearly),
            "custom" => Ok(Self::Custom),
            other => Err(EngineError::InvalidSchedule(format!(
                "invalid recurrence type: {other}"
            ))),
        }
    }
}

/// `Completed` and `Cancelled` are terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl RecurringStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl TryFrom<&str> for RecurringStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidState(format!(
                "invalid recurring status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTransaction {
    pub id: Uuid,
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
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: Option<u32>,
    pub day_of_month: Option<u32>,
    pub month_of_year: Option<u32>,
    pub status: RecurringStatus,
    pub last_executed: Option<DateTime<Utc>>,
    pub next_due: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringTransaction {
    #[must_use]
    pub fn schedule(&self) -> Schedule {
        Schedule {
            recur_type: self.recur_type,
            frequency: self.frequency,
            day_of_week: self.day_of_week,
            day_of_month: self.day_of_month,
            month_of_year: self.month_of_year,
        }
    }

    /// The columns a concurrent writer always changes, read before an edit.
    #[must_use]
    pub fn version(&self) -> RecurringVersion {
        RecurringVersion {
            status: self.status,
            next_due: self.next_due,
            updated_at: self.updated_at,
        }
    }

    /// `true` when `next_due` lies past the end date.
    #[must_use]
    pub fn ends_before(&self, next_due: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| next_due > end)
    }
}

/// Optimistic guard for user edits. Every store write moves at least one of
/// these: the processor changes `next_due` or `status`, cancellation changes
/// `status`, and edits stamp `updated_at`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecurringVersion {
    pub status: RecurringStatus,
    pub next_due: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Execution state written by the processor after posting an occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionUpdate {
    pub last_executed: DateTime<Utc>,
    pub next_due: DateTime<Utc>,
    pub status: RecurringStatus,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "recurring_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub name: String,
    pub kind: String,
    pub amount_minor: i64,
    pub note: Option<String>,
    pub start_date: DateTimeUtc,
    pub end_date: Option<DateTimeUtc>,
    pub recur_type: String,
    pub frequency: i32,
    pub day_of_week: Option<i32>,
    pub day_of_month: Option<i32>,
    pub month_of_year: Option<i32>,
    pub status: String,
    pub last_executed: Option<DateTimeUtc>,
    pub next_due: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
    #[sea_orm(has_many = "super::reminders::Entity")]
    Reminders,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::reminders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reminders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn to_db_int(value: u32, label: &str) -> ResultEngine<i32> {
    i32::try_from(value)
        .map_err(|_| EngineError::InvalidSchedule(format!("{label} out of range: {value}")))
}

fn from_db_int(value: i32, label: &str) -> ResultEngine<u32> {
    u32::try_from(value)
        .map_err(|_| EngineError::InvalidSchedule(format!("negative {label}: {value}")))
}

impl TryFrom<&RecurringTransaction> for ActiveModel {
    type Error = EngineError;

    fn try_from(tx: &RecurringTransaction) -> ResultEngine<Self> {
        Ok(Self {
            id: ActiveValue::Set(tx.id.to_string()),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            account_id: ActiveValue::Set(tx.account_id.to_string()),
            name: ActiveValue::Set(tx.name.clone()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            note: ActiveValue::Set(tx.note.clone()),
            start_date: ActiveValue::Set(tx.start_date),
            end_date: ActiveValue::Set(tx.end_date),
            recur_type: ActiveValue::Set(tx.recur_type.as_str().to_string()),
            frequency: ActiveValue::Set(to_db_int(tx.frequency, "frequency")?),
            day_of_week: ActiveValue::Set(
                tx.day_of_week
                    .map(|v| to_db_int(v, "day_of_week"))
                    .transpose()?,
            ),
            day_of_month: ActiveValue::Set(
                tx.day_of_month
                    .map(|v| to_db_int(v, "day_of_month"))
                    .transpose()?,
            ),
            month_of_year: ActiveValue::Set(
                tx.month_of_year
                    .map(|v| to_db_int(v, "month_of_year"))
                    .transpose()?,
            ),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            last_executed: ActiveValue::Set(tx.last_executed),
            next_due: ActiveValue::Set(tx.next_due),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
        })
    }
}

impl TryFrom<Model> for RecurringTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "recurring transaction")?,
            user_id: model.user_id,
            account_id: parse_uuid(&model.account_id, "account")?,
            name: model.name,
            kind: LedgerType::try_from(model.kind.as_str())?,
            amount_minor: model.amount_minor,
            note: model.note,
            start_date: model.start_date,
            end_date: model.end_date,
            recur_type: RecurType::from_stored(&model.recur_type),
            frequency: from_db_int(model.frequency, "frequency")?,
            day_of_week: model
                .day_of_week
                .map(|v| from_db_int(v, "day_of_week"))
                .transpose()?,
            day_of_month: model
                .day_of_month
                .map(|v| from_db_int(v, "day_of_month"))
                .transpose()?,
            month_of_year: model
                .month_of_year
                .map(|v| from_db_int(v, "month_of_year"))
                .transpose()?,
            status: RecurringStatus::try_from(model.status.as_str())?,
            last_executed: model.last_executed,
            next_due: model.next_due,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_parse_rejects_unknown_tags() {
        assert_eq!(RecurType::try_from("Weekly").unwrap(), RecurType::Weekly);
        assert!(RecurType::try_from("fortnightly").is_err());
    }

    #[test]
    fn stored_unknown_tag_is_kept_as_unrecognized() {
        assert_eq!(RecurType::from_stored("fortnightly"), RecurType::Unrecognized);
        assert_eq!(RecurType::from_stored("quarterly"), RecurType::Quarterly);
    }

    fn sample(frequency: u32) -> RecurringTransaction {
        let at = DateTime::<Utc>::UNIX_EPOCH;
        RecurringTransaction {
            id: Uuid::new_v4(),
            user_id: "alice".to_string(),
            account_id: Uuid::new_v4(),
            name: "Rent".to_string(),
            kind: LedgerType::Expense,
            amount_minor: -90_000,
            note: None,
            start_date: at,
            end_date: None,
            recur_type: RecurType::Daily,
            frequency,
            day_of_week: None,
            day_of_month: Some(31),
            month_of_year: None,
            status: RecurringStatus::Active,
            last_executed: None,
            next_due: at,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn oversized_frequency_is_not_truncated() {
        let err = ActiveModel::try_from(&sample(3_000_000_000)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSchedule(_)));

        let active = ActiveModel::try_from(&sample(7)).unwrap();
        assert_eq!(active.frequency, ActiveValue::Set(7));
        assert_eq!(active.day_of_month, ActiveValue::Set(Some(31)));
    }

    #[test]
    fn terminal_statuses() {
        assert!(RecurringStatus::Completed.is_terminal());
        assert!(RecurringStatus::Cancelled.is_terminal());
        assert!(!RecurringStatus::Paused.is_terminal());
        assert!(!RecurringStatus::Active.is_terminal());
    }
}
