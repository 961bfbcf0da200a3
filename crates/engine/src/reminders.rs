//! Lead-time reminders for upcoming recurring transactions.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub recurring_id: Uuid,
    pub reminder_date: DateTime<Utc>,
    pub is_read: bool,
    /// Set by the first mark-as-read, never cleared.
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(
        recurring_id: Uuid,
        reminder_date: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recurring_id,
            reminder_date,
            is_read: false,
            read_at: None,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "reminders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub recurring_id: String,
    pub reminder_date: DateTimeUtc,
    pub is_read: bool,
    pub read_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::recurring::Entity",
        from = "Column::RecurringId",
        to = "super::recurring::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Recurring,
}

impl Related<super::recurring::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recurring.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Reminder> for ActiveModel {
    fn from(value: &Reminder) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            recurring_id: ActiveValue::Set(value.recurring_id.to_string()),
            reminder_date: ActiveValue::Set(value.reminder_date),
            is_read: ActiveValue::Set(value.is_read),
            read_at: ActiveValue::Set(value.read_at),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Reminder {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "reminder")?,
            recurring_id: parse_uuid(&model.recurring_id, "recurring transaction")?,
            reminder_date: model.reminder_date,
            is_read: model.is_read,
            read_at: model.read_at,
            created_at: model.created_at,
        })
    }
}
