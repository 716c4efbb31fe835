//! Subscription tier and the numeric caps derived from it.
//!
//! The core enforces only the caps. Whether a feature is unlocked at all is
//! decided above this crate.

use serde::{Deserialize, Serialize};

/// Maximum number of overlays visible at once, for every tier.
pub const MAX_OVERLAYS_VISIBLE: usize = 3;

/// Subscription level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

impl Tier {
    pub fn from_premium(is_premium: bool) -> Self {
        if is_premium {
            Tier::Premium
        } else {
            Tier::Free
        }
    }

    /// Maximum number of destination countries.
    pub fn destination_cap(self) -> usize {
        match self {
            Tier::Free => 2,
            Tier::Premium => 5,
        }
    }

    pub fn is_premium(self) -> bool {
        self == Tier::Premium
    }
}

/// Source of the premium flag (license check, account API, local flag).
pub trait EntitlementSource {
    fn is_premium(&self) -> bool;

    fn tier(&self) -> Tier {
        Tier::from_premium(self.is_premium())
    }
}

/// Fixed entitlement, for tests and offline use.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticEntitlement(pub Tier);

impl EntitlementSource for StaticEntitlement {
    fn is_premium(&self) -> bool {
        self.0.is_premium()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_by_tier() {
        assert_eq!(Tier::Free.destination_cap(), 2);
        assert_eq!(Tier::Premium.destination_cap(), 5);
        assert_eq!(Tier::from_premium(true), Tier::Premium);
        assert_eq!(Tier::default(), Tier::Free);
    }

    #[test]
    fn static_source_reports_tier() {
        assert!(StaticEntitlement(Tier::Premium).is_premium());
        assert_eq!(StaticEntitlement::default().tier(), Tier::Free);
    }
}
