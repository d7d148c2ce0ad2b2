//! bank-transfer - an atomic money-transfer engine
//!
//! Transfers run inside transactions managed with explicit propagation,
//! isolation, rollback rules, timeouts and savepoint nesting. Storage sits
//! behind the [`storage::StorageBackend`] trait; an in-memory backend with a
//! bounded connection pool ships with the crate.
//!
//! # Example
//!
//! ```
//! use bank_transfer::bank::TransferService;
//! use bank_transfer::config::EngineConfig;
//! use rust_decimal::Decimal;
//!
//! let (_backend, manager) = EngineConfig::default().build();
//! let service = TransferService::new(manager.clone());
//! let mut chain = manager.chain();
//!
//! let a = service.open_account(&mut chain, "ACC-001", Decimal::from(1000)).unwrap();
//! let b = service.open_account(&mut chain, "ACC-002", Decimal::from(500)).unwrap();
//! let receipt = service.transfer(&mut chain, a.id, b.id, Decimal::from(100)).unwrap();
//! assert_eq!(receipt.to.balance, Decimal::from(600));
//! ```

pub mod bank;
pub mod config;
pub mod logging;
pub mod storage;
pub mod transaction;
