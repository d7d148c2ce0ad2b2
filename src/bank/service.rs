//! Transfer service.
//!
//! Every operation runs through [`TransactionManager::execute`], so a
//! transfer called with an empty chain gets its own transaction and a
//! transfer called inside a caller's transaction joins it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};
use ulid::Ulid;

use crate::bank::account::{Account, AccountId};
use crate::bank::error::{TransferError, TransferResult};
use crate::bank::repository::AccountRepository;
use crate::transaction::{
    IsolationLevel, Propagation, RollbackRule, TransactionChain, TransactionDefinition,
    TransactionManager, TIMEOUT_DEFAULT,
};

/// Result of a completed transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub id: String,
    /// Source account after the debit.
    pub from: Account,
    /// Target account after the credit.
    pub to: Account,
    pub amount: Decimal,
    pub completed_at: DateTime<Utc>,
}

/// Moves money between accounts.
#[derive(Debug, Clone)]
pub struct TransferService {
    manager: TransactionManager,
    accounts: AccountRepository,
    timeout_secs: i64,
    rollback_rule: RollbackRule,
}

impl TransferService {
    pub fn new(manager: TransactionManager) -> Self {
        Self {
            accounts: AccountRepository::new(manager.clone()),
            manager,
            timeout_secs: TIMEOUT_DEFAULT,
            rollback_rule: RollbackRule::default(),
        }
    }

    /// Timeout applied to transactions this service starts.
    pub fn with_timeout_secs(mut self, secs: i64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Rule deciding which failures roll a transfer back.
    pub fn with_rollback_rule(mut self, rule: RollbackRule) -> Self {
        self.rollback_rule = rule;
        self
    }

    pub fn accounts(&self) -> &AccountRepository {
        &self.accounts
    }

    fn definition(&self, name: &str, propagation: Propagation) -> TransactionDefinition {
        TransactionDefinition::new(propagation)
            .named(name)
            .isolation(IsolationLevel::ReadCommitted)
            .timeout_secs(self.timeout_secs)
            .rollback_rule(self.rollback_rule.clone())
    }

    /// Open an account with a unique account number.
    pub fn open_account(
        &self,
        chain: &mut TransactionChain,
        account_number: &str,
        initial_balance: Decimal,
    ) -> TransferResult<Account> {
        if initial_balance < Decimal::ZERO {
            return Err(TransferError::InvalidAmount(initial_balance));
        }
        let definition = self.definition("TransferService.open_account", Propagation::Required);
        let account = self.manager.execute(chain, &definition, |chain| {
            if self.accounts.find_by_number(chain, account_number)?.is_some() {
                return Err(TransferError::DuplicateAccountNumber(
                    account_number.to_string(),
                ));
            }
            Ok(self.accounts.create(chain, account_number, initial_balance)?)
        })?;
        debug!(account = %account.id, number = %account.account_number, balance = %account.balance, "account opened");
        Ok(account)
    }

    /// Current balance of an account, in the caller's transaction if any.
    pub fn balance(&self, chain: &mut TransactionChain, id: AccountId) -> TransferResult<Decimal> {
        let definition = self.definition("TransferService.balance", Propagation::Supports);
        self.manager.execute(chain, &definition, |chain| {
            self.accounts
                .find_by_id(chain, id)?
                .map(|account| account.balance)
                .ok_or(TransferError::AccountNotFound(id))
        })
    }

    pub fn find_by_number(
        &self,
        chain: &mut TransactionChain,
        account_number: &str,
    ) -> TransferResult<Option<Account>> {
        let definition = self.definition("TransferService.find_by_number", Propagation::Supports);
        self.manager.execute(chain, &definition, |chain| {
            Ok(self.accounts.find_by_number(chain, account_number)?)
        })
    }

    /// Move `amount` from one account to another.
    ///
    /// Either both balances change or neither does, unless the configured
    /// rollback rule lets a failure commit partial work.
    pub fn transfer(
        &self,
        chain: &mut TransactionChain,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> TransferResult<TransferReceipt> {
        if amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount(amount));
        }
        if from == to {
            return Err(TransferError::SameAccount(from));
        }

        let definition = self.definition("TransferService.transfer", Propagation::Required);
        let (source, target) = self.manager.execute(chain, &definition, |chain| {
            let mut source = self
                .accounts
                .find_by_id(chain, from)?
                .ok_or(TransferError::AccountNotFound(from))?;
            let mut target = self
                .accounts
                .find_by_id(chain, to)?
                .ok_or(TransferError::AccountNotFound(to))?;

            source.debit(amount)?;
            self.accounts.save(chain, &source)?;
            target.credit(amount)?;
            self.accounts.save(chain, &target)?;
            Ok::<_, TransferError>((source, target))
        })?;

        let receipt = TransferReceipt {
            id: Ulid::new().to_string().to_lowercase(),
            from: source,
            to: target,
            amount,
            completed_at: Utc::now(),
        };
        info!(transfer = %receipt.id, from = %from, to = %to, amount = %amount, "transfer completed");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::repository::ACCOUNTS_TABLE;
    use crate::storage::{MemoryBackend, StorageError};
    use crate::transaction::TransactionError;

    fn setup() -> (MemoryBackend, TransactionManager, TransferService, AccountId, AccountId) {
        let backend = MemoryBackend::new();
        let manager = TransactionManager::new(backend.clone());
        let service = TransferService::new(manager.clone());
        let mut chain = manager.chain();
        let a = service
            .open_account(&mut chain, "ACC-A", Decimal::from(1000))
            .unwrap();
        let b = service
            .open_account(&mut chain, "ACC-B", Decimal::from(500))
            .unwrap();
        (backend, manager, service, a.id, b.id)
    }

    fn balances(
        manager: &TransactionManager,
        service: &TransferService,
        a: AccountId,
        b: AccountId,
    ) -> (Decimal, Decimal) {
        let mut chain = manager.chain();
        (
            service.balance(&mut chain, a).unwrap(),
            service.balance(&mut chain, b).unwrap(),
        )
    }

    #[test]
    fn test_transfer_moves_money() {
        let (_backend, manager, service, a, b) = setup();
        let mut chain = manager.chain();

        let receipt = service
            .transfer(&mut chain, a, b, Decimal::from(100))
            .unwrap();
        assert_eq!(receipt.from.balance, Decimal::from(900));
        assert_eq!(receipt.to.balance, Decimal::from(600));
        assert_eq!(receipt.amount, Decimal::from(100));
        assert_eq!(receipt.id.len(), 26);

        assert_eq!(
            balances(&manager, &service, a, b),
            (Decimal::from(900), Decimal::from(600))
        );
        assert!(chain.is_empty());
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_insufficient_funds_commits_by_default() {
        let (_backend, manager, service, a, b) = setup();
        let mut chain = manager.chain();
        let before = manager.stats();

        let err = service
            .transfer(&mut chain, a, b, Decimal::from(2000))
            .unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { .. }));

        let after = manager.stats();
        assert_eq!(after.committed, before.committed + 1);
        assert_eq!(after.rolled_back, before.rolled_back);
        assert_eq!(
            balances(&manager, &service, a, b),
            (Decimal::from(1000), Decimal::from(500))
        );
    }

    #[test]
    fn test_insufficient_funds_rolls_back_when_opted_in() {
        let (_backend, manager, service, a, b) = setup();
        let service = service.with_rollback_rule(
            RollbackRule::new().rollback_for(TransferError::INSUFFICIENT_FUNDS),
        );
        let mut chain = manager.chain();
        let before = manager.stats();

        let err = service
            .transfer(&mut chain, a, b, Decimal::from(2000))
            .unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { .. }));

        let after = manager.stats();
        assert_eq!(after.rolled_back, before.rolled_back + 1);
        assert_eq!(after.committed, before.committed);
        assert_eq!(
            balances(&manager, &service, a, b),
            (Decimal::from(1000), Decimal::from(500))
        );
    }

    #[test]
    fn test_rejects_bad_requests() {
        let (_backend, manager, service, a, b) = setup();
        let mut chain = manager.chain();

        assert!(matches!(
            service.transfer(&mut chain, a, AccountId(99), Decimal::from(1)),
            Err(TransferError::AccountNotFound(AccountId(99)))
        ));
        assert!(matches!(
            service.transfer(&mut chain, a, b, Decimal::ZERO),
            Err(TransferError::InvalidAmount(_))
        ));
        assert!(matches!(
            service.transfer(&mut chain, a, b, Decimal::from(-5)),
            Err(TransferError::InvalidAmount(_))
        ));
        assert!(matches!(
            service.transfer(&mut chain, a, a, Decimal::from(1)),
            Err(TransferError::SameAccount(_))
        ));
        assert!(matches!(
            service.open_account(&mut chain, "ACC-A", Decimal::ZERO),
            Err(TransferError::DuplicateAccountNumber(_))
        ));
        assert!(chain.is_empty());
    }

    #[test]
    fn test_failed_credit_undoes_debit() {
        let (backend, manager, service, a, b) = setup();
        let mut chain = manager.chain();
        backend.inject_write_fault(ACCOUNTS_TABLE, &b.to_string());

        let err = service
            .transfer(&mut chain, a, b, Decimal::from(100))
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Transaction(TransactionError::Storage(StorageError::InjectedFault { .. }))
        ));

        assert_eq!(
            balances(&manager, &service, a, b),
            (Decimal::from(1000), Decimal::from(500))
        );
        assert_eq!(backend.in_use(), 0);
    }

    #[test]
    fn test_credit_overflow_rolls_back_transfer() {
        let (backend, manager, service, a, _b) = setup();
        let mut chain = manager.chain();
        let full = service
            .open_account(&mut chain, "ACC-FULL", Decimal::MAX)
            .unwrap();

        let err = service
            .transfer(&mut chain, a, full.id, Decimal::from(5))
            .unwrap_err();
        assert!(matches!(err, TransferError::BalanceOverflow { .. }));

        assert_eq!(service.balance(&mut chain, a).unwrap(), Decimal::from(1000));
        assert_eq!(service.balance(&mut chain, full.id).unwrap(), Decimal::MAX);
        assert!(chain.is_empty());
        assert_eq!(backend.in_use(), 0);
    }

    #[test]
    fn test_transfers_join_caller_transaction() {
        let (_backend, manager, service, a, b) = setup();
        let mut chain = manager.chain();
        let outer = TransactionDefinition::new(Propagation::Required).named("batch");

        let result: TransferResult<()> = manager.execute(&mut chain, &outer, |chain| {
            service.transfer(chain, a, b, Decimal::from(100))?;
            service.transfer(chain, b, AccountId(404), Decimal::from(50))?;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(TransferError::AccountNotFound(AccountId(404)))
        ));

        // First transfer went down with the batch
        assert_eq!(
            balances(&manager, &service, a, b),
            (Decimal::from(1000), Decimal::from(500))
        );
    }

    #[test]
    fn test_timeout_rolls_back_transfer() {
        let (backend, manager, service, a, b) = setup();
        let service = service.with_timeout_secs(0);
        let mut chain = manager.chain();

        let err = service
            .transfer(&mut chain, a, b, Decimal::from(100))
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Transaction(TransactionError::Timeout { .. })
        ));
        assert_eq!(backend.in_use(), 0);
        assert!(chain.is_empty());
        assert_eq!(
            balances(&manager, &service, a, b),
            (Decimal::from(1000), Decimal::from(500))
        );
    }

    #[test]
    fn test_find_by_number() {
        let (_backend, manager, service, a, _b) = setup();
        let mut chain = manager.chain();
        let found = service.find_by_number(&mut chain, "ACC-A").unwrap().unwrap();
        assert_eq!(found.id, a);
        assert!(service.find_by_number(&mut chain, "nope").unwrap().is_none());
    }

    #[test]
    fn test_concurrent_transfers_conserve_total() {
        let (_backend, manager, service, a, b) = setup();

        std::thread::scope(|s| {
            for worker in 0..4 {
                let manager = manager.clone();
                let service = service.clone();
                s.spawn(move || {
                    let mut chain = manager.chain();
                    for i in 0..25 {
                        let (from, to) = if (worker + i) % 2 == 0 { (a, b) } else { (b, a) };
                        loop {
                            match service.transfer(&mut chain, from, to, Decimal::from(3)) {
                                Ok(_) => break,
                                Err(e) if e.is_retryable() => continue,
                                Err(e) => panic!("transfer failed: {e}"),
                            }
                        }
                    }
                });
            }
        });

        let (balance_a, balance_b) = balances(&manager, &service, a, b);
        assert_eq!(balance_a + balance_b, Decimal::from(1500));
        assert!(balance_a >= Decimal::ZERO && balance_b >= Decimal::ZERO);
        assert_eq!(manager.active_count(), 0);
    }
}
