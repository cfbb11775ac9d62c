use std::fmt;

use serde::{Deserialize, Serialize};

/// What a shielded transaction does with public funds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Deposit public funds into the pool
    Shield,
    /// Withdraw funds from the pool through a relayer
    Unshield,
    /// Move funds inside the pool, only the relayer fee leaves it
    Transfer,
}

impl Action {
    /// Whether the transaction is submitted by a relayer
    pub fn uses_relayer(&self) -> bool {
        !matches!(self, Action::Shield)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Shield => "shield",
            Action::Unshield => "unshield",
            Action::Transfer => "transfer",
        })
    }
}
