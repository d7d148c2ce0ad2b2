//! Transfer error types.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::bank::account::AccountId;
use crate::transaction::{Classify, FailureKind, TransactionError};

/// Result type for account and transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors raised by the transfer service.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// The source account cannot cover the amount. Checked: does not roll
    /// back unless the rollback rule opts it in.
    #[error("insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("crediting {amount} to account {account} overflows balance {balance}")]
    BalanceOverflow {
        account: AccountId,
        balance: Decimal,
        amount: Decimal,
    },

    #[error("amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),

    #[error("source and target account are the same: {0}")]
    SameAccount(AccountId),

    #[error("account number already exists: {0}")]
    DuplicateAccountNumber(String),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

impl TransferError {
    /// Failure kind name of [`TransferError::InsufficientFunds`], for rollback rules.
    pub const INSUFFICIENT_FUNDS: &'static str = "InsufficientFunds";
    /// Failure kind name of [`TransferError::AccountNotFound`], for rollback rules.
    pub const ACCOUNT_NOT_FOUND: &'static str = "AccountNotFound";

    /// Check if retrying the whole transfer may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Transaction(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl Classify for TransferError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            TransferError::AccountNotFound(_) => FailureKind::unchecked(Self::ACCOUNT_NOT_FOUND),
            TransferError::InsufficientFunds { .. } => {
                FailureKind::checked(Self::INSUFFICIENT_FUNDS)
            }
            TransferError::BalanceOverflow { .. } => FailureKind::unchecked("BalanceOverflow"),
            TransferError::InvalidAmount(_) => FailureKind::unchecked("InvalidAmount"),
            TransferError::SameAccount(_) => FailureKind::unchecked("SameAccount"),
            TransferError::DuplicateAccountNumber(_) => {
                FailureKind::unchecked("DuplicateAccountNumber")
            }
            TransferError::Transaction(e) => e.failure_kind(),
        }
    }
}
