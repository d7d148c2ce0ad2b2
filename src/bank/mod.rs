//! Accounts and money transfer.
//!
//! ```
//! use bank_transfer::bank::TransferService;
//! use bank_transfer::storage::MemoryBackend;
//! use bank_transfer::transaction::TransactionManager;
//! use rust_decimal::Decimal;
//!
//! let manager = TransactionManager::new(MemoryBackend::new());
//! let service = TransferService::new(manager.clone());
//! let mut chain = manager.chain();
//!
//! let a = service.open_account(&mut chain, "ACC-001", Decimal::from(1000)).unwrap();
//! let b = service.open_account(&mut chain, "ACC-002", Decimal::from(500)).unwrap();
//! service.transfer(&mut chain, a.id, b.id, Decimal::from(100)).unwrap();
//!
//! assert_eq!(service.balance(&mut chain, a.id).unwrap(), Decimal::from(900));
//! ```

mod account;
mod error;
mod repository;
mod service;

pub use account::{Account, AccountId};
pub use error::{TransferError, TransferResult};
pub use repository::{AccountRepository, ACCOUNTS_TABLE};
pub use service::{TransferReceipt, TransferService};
