//! bank-transfer demo
//!
//! Seeds two accounts in the memory backend and runs the documented
//! transfer scenarios, printing balances after each one.

use std::path::PathBuf;
use std::process::ExitCode;

use bank_transfer::bank::{AccountId, TransferError, TransferService, ACCOUNTS_TABLE};
use bank_transfer::config::EngineConfig;
use bank_transfer::logging::LogConfig;
use bank_transfer::storage::MemoryBackend;
use bank_transfer::transaction::{RollbackRule, TransactionManager};
use rust_decimal::Decimal;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(PathBuf::from(&args[i]));
                }
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("bank-transfer v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            arg => {
                eprintln!("Unknown option: {}", arg);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => match EngineConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };

    let logging = if verbose {
        LogConfig::debug().with_format(config.logging.format)
    } else {
        config.logging.clone()
    };
    if let Err(e) = logging.init() {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    let (backend, manager) = config.build();
    match run_scenarios(&backend, &manager) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("bank-transfer - atomic money transfer demo");
    println!();
    println!("Usage: bank-transfer [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config PATH    JSON engine configuration");
    println!("  -v, --verbose        Log at debug level");
    println!("  -h, --help           Show this help message");
    println!("  --version            Show version");
    println!();
    println!("RUST_LOG overrides the configured log level.");
}

fn run_scenarios(backend: &MemoryBackend, manager: &TransactionManager) -> Result<(), TransferError> {
    let service = TransferService::new(manager.clone());
    let mut chain = manager.chain();

    let a = service.open_account(&mut chain, "ACC-001", Decimal::from(1000))?;
    let b = service.open_account(&mut chain, "ACC-002", Decimal::from(500))?;
    print_balances("opened", &service, manager, a.id, b.id)?;

    // 1. Plain transfer
    let receipt = service.transfer(&mut chain, a.id, b.id, Decimal::from(100))?;
    println!("transfer {} moved {}", receipt.id, receipt.amount);
    print_balances("after transfer of 100", &service, manager, a.id, b.id)?;

    // 2. Insufficient funds, default rule and opted-in rule
    report(service.transfer(&mut chain, a.id, b.id, Decimal::from(2000)));
    let strict = service
        .clone()
        .with_rollback_rule(RollbackRule::new().rollback_for(TransferError::INSUFFICIENT_FUNDS));
    report(strict.transfer(&mut chain, a.id, b.id, Decimal::from(2000)));
    print_balances("after insufficient funds", &service, manager, a.id, b.id)?;

    // 3. Credit write fails after the debit
    backend.inject_write_fault(ACCOUNTS_TABLE, &b.id.to_string());
    report(service.transfer(&mut chain, a.id, b.id, Decimal::from(100)));
    print_balances("after failed credit", &service, manager, a.id, b.id)?;

    let stats = manager.stats();
    println!(
        "transactions: {} begun, {} committed, {} rolled back, {} timed out",
        stats.begun, stats.committed, stats.rolled_back, stats.timed_out
    );
    Ok(())
}

fn report<T>(result: Result<T, TransferError>) {
    match result {
        Ok(_) => println!("transfer succeeded"),
        Err(e) => println!("transfer failed: {}", e),
    }
}

fn print_balances(
    label: &str,
    service: &TransferService,
    manager: &TransactionManager,
    a: AccountId,
    b: AccountId,
) -> Result<(), TransferError> {
    let mut chain = manager.chain();
    let balance_a = service.balance(&mut chain, a)?;
    let balance_b = service.balance(&mut chain, b)?;
    println!("{:<28} A = {:>6}  B = {:>6}", label, balance_a, balance_b);
    Ok(())
}
