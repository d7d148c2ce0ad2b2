//! Transaction isolation levels.
//!
//! The engine only requests a level from the storage backend; preventing
//! dirty, non-repeatable and phantom reads is the backend's job. A backend
//! may run a transaction at a stronger level than requested.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Isolation level requested for a physical transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Dirty reads allowed. The memory backend keeps writes private until
    /// commit, so this behaves like `ReadCommitted` there.
    ReadUncommitted,

    /// Every read returns the latest committed row. Two reads of the same
    /// row may disagree if someone commits in between.
    #[default]
    ReadCommitted,

    /// Reads come from the committed state as of `begin`.
    RepeatableRead,

    /// Snapshot reads, and commit fails if any row read or written has
    /// changed since it was first seen.
    Serializable,
}

impl IsolationLevel {
    /// Whether reads are served from a snapshot taken at begin.
    pub fn uses_snapshot(&self) -> bool {
        matches!(
            self,
            IsolationLevel::RepeatableRead | IsolationLevel::Serializable
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "may observe uncommitted writes",
            IsolationLevel::ReadCommitted => "observes committed writes as they land",
            IsolationLevel::RepeatableRead => "observes the committed state at begin",
            IsolationLevel::Serializable => "equivalent to some serial order of transactions",
        }
    }

    fn sql_name(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// Accepts SQL names with spaces, underscores or nothing between words,
/// in any case, plus `SNAPSHOT` for repeatable read.
impl std::str::FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "READUNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
            "READCOMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLEREAD" | "SNAPSHOT" => Ok(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            _ => Err(format!("unknown isolation level: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_committed_is_default_and_not_snapshot() {
        let level = IsolationLevel::default();
        assert_eq!(level, IsolationLevel::ReadCommitted);
        assert!(!level.uses_snapshot());
        assert!(!IsolationLevel::ReadUncommitted.uses_snapshot());
        assert!(IsolationLevel::Serializable.uses_snapshot());
    }

    #[test]
    fn test_parse_isolation() {
        assert_eq!(
            "READ UNCOMMITTED".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadUncommitted
        );
        assert_eq!(
            "read_committed".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert_eq!(
            "repeatable read".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            "Serializable".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Serializable
        );
        assert!("chaos".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for level in [
            IsolationLevel::ReadUncommitted,
            IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead,
            IsolationLevel::Serializable,
        ] {
            assert_eq!(level.to_string().parse::<IsolationLevel>().unwrap(), level);
        }
    }
}
