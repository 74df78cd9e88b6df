//! Expense models: drafts, queued records and server-confirmed records

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::unix_millis_now;

const LOCAL_ID_PREFIX: &str = "offline_";
const LOCAL_ID_SUFFIX_LEN: usize = 13;
/// Amounts are stored as JSON numbers; beyond cents or this magnitude they
/// no longer survive the trip through `f64`.
const MAX_AMOUNT_SCALE: u32 = 2;
const MAX_AMOUNT_CENTS: i64 = 99_999_999_999_999;

/// Device-local identifier of a queued expense.
///
/// Format: `offline_<epoch-ms>_<random-suffix>`. Assigned once when the record
/// is queued and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(String);

impl LocalId {
    /// Generate a fresh identifier stamped with the current time.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_at(unix_millis_now())
    }

    fn generate_at(epoch_ms: i64) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        let suffix = &random[..LOCAL_ID_SUFFIX_LEN];
        Self(format!("{LOCAL_ID_PREFIX}{epoch_ms}_{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Millisecond timestamp embedded in the identifier, if it parses.
    pub fn created_at_ms(&self) -> Option<i64> {
        let rest = self.0.strip_prefix(LOCAL_ID_PREFIX)?;
        let (millis, _) = rest.split_once('_')?;
        millis.parse().ok()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LocalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let valid = s
            .strip_prefix(LOCAL_ID_PREFIX)
            .and_then(|rest| rest.split_once('_'))
            .is_some_and(|(millis, suffix)| {
                !millis.is_empty()
                    && millis.chars().all(|c| c.is_ascii_digit())
                    && !suffix.is_empty()
            });
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidInput(format!("not an offline expense id: {s}")))
        }
    }
}

/// Domain fields of an expense, as submitted to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub name: String,
    pub amount: Decimal,
    pub category_id: Uuid,
    /// Set when the expense was captured without a connection
    #[serde(default)]
    pub is_offline: bool,
    #[serde(default)]
    pub is_public: bool,
    /// Calendar date of the expense, serialized as `YYYY-MM-DD`
    pub timestamp: NaiveDate,
}

impl ExpenseDraft {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        amount: Decimal,
        category_id: Uuid,
        timestamp: NaiveDate,
    ) -> Self {
        Self {
            name: name.into(),
            amount,
            category_id,
            is_offline: false,
            is_public: false,
            timestamp,
        }
    }

    #[must_use]
    pub const fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    /// Reject drafts the server would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "expense name must not be empty".to_string(),
            ));
        }
        if self.amount <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "expense amount must be positive, got {}",
                self.amount
            )));
        }
        if self.amount.normalize().scale() > MAX_AMOUNT_SCALE {
            return Err(Error::InvalidInput(format!(
                "expense amount must have at most {MAX_AMOUNT_SCALE} decimal places, got {}",
                self.amount
            )));
        }
        let max_amount = Decimal::new(MAX_AMOUNT_CENTS, MAX_AMOUNT_SCALE);
        if self.amount > max_amount {
            return Err(Error::InvalidInput(format!(
                "expense amount must not exceed {max_amount}, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// An expense waiting in the local queue for server confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingExpense {
    #[serde(flatten)]
    pub expense: ExpenseDraft,
    pub local_id: LocalId,
    #[serde(default)]
    pub is_synced: bool,
    /// Failed submission attempts so far
    #[serde(default)]
    pub attempts: u32,
}

impl PendingExpense {
    /// Wrap a draft with a fresh local identity, unsynced.
    #[must_use]
    pub fn new(expense: ExpenseDraft) -> Self {
        Self {
            expense,
            local_id: LocalId::generate(),
            is_synced: false,
            attempts: 0,
        }
    }

    /// The draft as sent to the server, without the local-only fields.
    pub fn submission(&self) -> &ExpenseDraft {
        &self.expense
    }
}

/// An expense confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    #[serde(flatten)]
    pub expense: ExpenseDraft,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Outcome of recording an expense: queued locally or accepted remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecordedExpense {
    Pending(PendingExpense),
    Confirmed(Expense),
}

impl RecordedExpense {
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub const fn expense(&self) -> &ExpenseDraft {
        match self {
            Self::Pending(pending) => &pending.expense,
            Self::Confirmed(expense) => &expense.expense,
        }
    }
}
