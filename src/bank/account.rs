//! Account entity.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bank::error::{TransferError, TransferResult};

/// Account identifier, allocated by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Storage key of the account row.
    pub(crate) fn key(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bank account.
///
/// Stored as one JSON row:
/// ```text
/// {
///   "id": 1,
///   "account_number": "ACC-001",
///   "balance": "1000",
///   "created_at": "xxxx-xx-xxT00:00:00Z",
///   "updated_at": "xxxx-xx-xxT00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// unique, human-facing number
    pub account_number: String,
    /// never negative at a commit boundary
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub(crate) fn new(id: AccountId, account_number: impl Into<String>, balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id,
            account_number: account_number.into(),
            balance,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_debit(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Take `amount` out of the account.
    pub(crate) fn debit(&mut self, amount: Decimal) -> TransferResult<()> {
        if !self.can_debit(amount) {
            return Err(TransferError::InsufficientFunds {
                account: self.id,
                balance: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Put `amount` into the account.
    pub(crate) fn credit(&mut self, amount: Decimal) -> TransferResult<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow {
                account: self.id,
                balance: self.balance,
                amount,
            })?;
        self.updated_at = Utc::now();
        Ok(())
    }
}
