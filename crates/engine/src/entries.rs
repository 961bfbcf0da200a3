//! Ledger entries.
//!
//! A [`LedgerEntry`] is a single dated, signed line against one account.
//! Amounts are signed integer **minor units**: the engine applies
//! `amount_minor` to the account balance as-is, the sign convention belongs
//! to the caller.
//!
//! Entries are append-only. They are edited in place only inside the
//! editable window, voided at most once, and corrected by layering an
//! adjustment entry on top (`is_adjustment`, `adjusted_from`).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError, ResultEngine,
    util::{apply_optional_text_patch, model_currency, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerType {
    Balance,
    Income,
    Expense,
    Transfer,
}

impl LedgerType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }
}

impl TryFrom<&str> for LedgerType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "balance" => Ok(Self::Balance),
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            other => Err(EngineError::InvalidState(format!(
                "invalid ledger type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub date: DateTime<Utc>,
    pub kind: LedgerType,
    pub currency: Currency,
    pub amount_minor: i64,
    pub note: Option<String>,
    pub is_adjustment: bool,
    pub adjusted_from: Option<Uuid>,
    pub is_voided: bool,
    pub voided_at: Option<DateTime<Utc>>,
    /// Creating twice with the same key yields one entry.
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub(crate) fn new(
        account_id: Uuid,
        date: DateTime<Utc>,
        kind: LedgerType,
        currency: Currency,
        amount_minor: i64,
        note: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            date,
            kind,
            currency,
            amount_minor,
            note,
            is_adjustment: false,
            adjusted_from: None,
            is_voided: false,
            voided_at: None,
            idempotency_key: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Amount this entry contributes to its account balance.
    #[must_use]
    pub fn live_amount_minor(&self) -> i64 {
        if self.is_voided { 0 } else { self.amount_minor }
    }

    pub(crate) fn apply_patch(&mut self, patch: &EntryPatch, updated_at: DateTime<Utc>) {
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(amount_minor) = patch.amount_minor {
            self.amount_minor = amount_minor;
        }
        self.note = apply_optional_text_patch(self.note.take(), patch.note.as_deref());
        self.updated_at = updated_at;
    }
}

/// Fields an in-place update may change. `None` means "leave as is".
///
/// `note` follows the text patch convention: `Some("")` clears the note.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub date: Option<DateTime<Utc>>,
    pub kind: Option<LedgerType>,
    pub amount_minor: Option<i64>,
    pub note: Option<String>,
}

impl EntryPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.kind.is_none()
            && self.amount_minor.is_none()
            && self.note.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub date: DateTimeUtc,
    pub kind: String,
    pub currency: String,
    pub amount_minor: i64,
    pub note: Option<String>,
    pub is_adjustment: bool,
    pub adjusted_from: Option<String>,
    pub is_voided: bool,
    pub voided_at: Option<DateTimeUtc>,
    pub idempotency_key: Option<String>,
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
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&LedgerEntry> for ActiveModel {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            account_id: ActiveValue::Set(entry.account_id.to_string()),
            date: ActiveValue::Set(entry.date),
            kind: ActiveValue::Set(entry.kind.as_str().to_string()),
            currency: ActiveValue::Set(entry.currency.code().to_string()),
            amount_minor: ActiveValue::Set(entry.amount_minor),
            note: ActiveValue::Set(entry.note.clone()),
            is_adjustment: ActiveValue::Set(entry.is_adjustment),
            adjusted_from: ActiveValue::Set(entry.adjusted_from.map(|id| id.to_string())),
            is_voided: ActiveValue::Set(entry.is_voided),
            voided_at: ActiveValue::Set(entry.voided_at),
            idempotency_key: ActiveValue::Set(entry.idempotency_key.clone()),
            created_at: ActiveValue::Set(entry.created_at),
            updated_at: ActiveValue::Set(entry.updated_at),
        }
    }
}

impl TryFrom<Model> for LedgerEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "entry")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            date: model.date,
            kind: LedgerType::try_from(model.kind.as_str())?,
            currency: model_currency(&model.currency)?,
            amount_minor: model.amount_minor,
            note: model.note,
            is_adjustment: model.is_adjustment,
            adjusted_from: model
                .adjusted_from
                .as_deref()
                .map(|raw| parse_uuid(raw, "entry"))
                .transpose()?,
            is_voided: model.is_voided,
            voided_at: model.voided_at,
            idempotency_key: model.idempotency_key,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
