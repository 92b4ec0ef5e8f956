//! Manager lifecycle states.

use std::fmt;

use streaks_offline_core::Error;

/// Where a manager instance is in its install/activate cycle.
///
/// Transitions only move forward: `Uninstalled → Installed → Active`.
/// A new cache version starts a fresh manager at `Uninstalled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Uninstalled,
    Installed,
    Active,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Uninstalled => "uninstalled",
            Lifecycle::Installed => "installed",
            Lifecycle::Active => "active",
        }
    }

    /// Check that `phase` may run from this state.
    pub(crate) fn expect(&self, expected: Lifecycle, phase: &str) -> Result<(), Error> {
        if *self == expected {
            Ok(())
        } else {
            Err(Error::Lifecycle(format!("{phase} requires state {expected}, manager is {self}")))
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
