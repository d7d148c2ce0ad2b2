//! Transaction propagation behaviors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a new unit of work relates to the transaction already in progress
/// on the calling chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Join the current transaction, or start a new one if none exists.
    #[default]
    Required,
    /// Always start a new, independent transaction, suspending the current one.
    RequiresNew,
    /// Run inside a savepoint of the current transaction, or start a new one.
    Nested,
    /// Join the current transaction if present, otherwise run non-transactionally.
    Supports,
    /// Suspend the current transaction and run non-transactionally.
    NotSupported,
    /// Join the current transaction; fail if there is none.
    Mandatory,
    /// Run non-transactionally; fail if a transaction is in progress.
    Never,
}

impl Propagation {
    /// Whether this behavior can open a new physical transaction.
    pub fn can_create_transaction(&self) -> bool {
        matches!(
            self,
            Propagation::Required | Propagation::RequiresNew | Propagation::Nested
        )
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Propagation::Required => "REQUIRED",
            Propagation::RequiresNew => "REQUIRES_NEW",
            Propagation::Nested => "NESTED",
            Propagation::Supports => "SUPPORTS",
            Propagation::NotSupported => "NOT_SUPPORTED",
            Propagation::Mandatory => "MANDATORY",
            Propagation::Never => "NEVER",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Propagation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace([' ', '-'], "_").as_str() {
            "REQUIRED" => Ok(Propagation::Required),
            "REQUIRES_NEW" => Ok(Propagation::RequiresNew),
            "NESTED" => Ok(Propagation::Nested),
            "SUPPORTS" => Ok(Propagation::Supports),
            "NOT_SUPPORTED" => Ok(Propagation::NotSupported),
            "MANDATORY" => Ok(Propagation::Mandatory),
            "NEVER" => Ok(Propagation::Never),
            _ => Err(format!("unknown propagation: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_required() {
        assert_eq!(Propagation::default(), Propagation::Required);
    }

    #[test]
    fn test_parse_propagation() {
        assert_eq!(
            "requires-new".parse::<Propagation>().unwrap(),
            Propagation::RequiresNew
        );
        assert_eq!(
            "NOT_SUPPORTED".parse::<Propagation>().unwrap(),
            Propagation::NotSupported
        );
        assert!("sometimes".parse::<Propagation>().is_err());
    }

    #[test]
    fn test_can_create_transaction() {
        assert!(Propagation::Nested.can_create_transaction());
        assert!(!Propagation::Mandatory.can_create_transaction());
        assert!(!Propagation::Supports.can_create_transaction());
    }
}
