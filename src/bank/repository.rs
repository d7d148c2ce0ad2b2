//! Account storage.
//!
//! The repository has no transaction management of its own: every call runs
//! on whatever physical transaction is bound to the caller's chain.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::bank::account::{Account, AccountId};
use crate::storage::{PhysicalConnection, StorageResult};
use crate::transaction::{TransactionChain, TransactionManager, TransactionResult};

/// Table holding account rows keyed by id.
pub const ACCOUNTS_TABLE: &str = "accounts";
/// Unique index from account number to id.
const ACCOUNT_NUMBERS_TABLE: &str = "account_numbers";
const SEQUENCES_TABLE: &str = "sequences";

/// Pass-through account storage over the chain's current transaction.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    manager: TransactionManager,
}

impl AccountRepository {
    pub fn new(manager: TransactionManager) -> Self {
        Self { manager }
    }

    pub fn find_by_id(
        &self,
        chain: &mut TransactionChain,
        id: AccountId,
    ) -> TransactionResult<Option<Account>> {
        self.manager
            .with_connection(chain, |conn| load(conn, &id.key()))
    }

    pub fn find_by_number(
        &self,
        chain: &mut TransactionChain,
        account_number: &str,
    ) -> TransactionResult<Option<Account>> {
        self.manager.with_connection(chain, |conn| {
            match conn.get(ACCOUNT_NUMBERS_TABLE, account_number)? {
                Some(id) => {
                    let id: AccountId = serde_json::from_value(id)?;
                    load(conn, &id.key())
                }
                None => Ok(None),
            }
        })
    }

    pub fn save(&self, chain: &mut TransactionChain, account: &Account) -> TransactionResult<()> {
        let row = serde_json::to_value(account).map_err(crate::storage::StorageError::from)?;
        self.manager
            .with_connection(chain, |conn| conn.put(ACCOUNTS_TABLE, &account.id.key(), row))
    }

    /// Insert a new account with the next id from the account sequence.
    ///
    /// Uniqueness of the account number is the caller's check.
    pub fn create(
        &self,
        chain: &mut TransactionChain,
        account_number: &str,
        balance: Decimal,
    ) -> TransactionResult<Account> {
        self.manager.with_connection(chain, |conn| {
            let id = AccountId(next_sequence(conn, ACCOUNTS_TABLE)?);
            let account = Account::new(id, account_number, balance);
            conn.put(ACCOUNTS_TABLE, &id.key(), serde_json::to_value(&account)?)?;
            conn.put(
                ACCOUNT_NUMBERS_TABLE,
                account_number,
                serde_json::to_value(id)?,
            )?;
            Ok(account)
        })
    }
}

fn load(conn: &mut dyn PhysicalConnection, key: &str) -> StorageResult<Option<Account>> {
    match conn.get(ACCOUNTS_TABLE, key)? {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}

fn next_sequence(conn: &mut dyn PhysicalConnection, name: &str) -> StorageResult<i64> {
    let current = match conn.get(SEQUENCES_TABLE, name)? {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        _ => 0,
    };
    let next = current + 1;
    conn.put(SEQUENCES_TABLE, name, Value::from(next))?;
    Ok(next)
}
