//! Plan resource limits.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A resource limit: a count, or `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Limit {
    /// At most this many.
    Count(u64),
    /// No limit.
    Unlimited,
}

impl Limit {
    /// Whether `used` is still within the limit.
    pub fn allows(&self, used: u64) -> bool {
        match self {
            Self::Count(max) => used < *max,
            Self::Unlimited => true,
        }
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self::Count(0)
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => serializer.serialize_u64(*n),
            Self::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(n) => Ok(Self::Count(n)),
            Raw::Text(s) if s.eq_ignore_ascii_case("unlimited") => Ok(Self::Unlimited),
            Raw::Text(s) => Err(D::Error::custom(format!(
                "invalid limit '{s}': expected a number or \"unlimited\""
            ))),
        }
    }
}

/// Limits attached to a plan. Missing entries default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Patient records.
    #[serde(default)]
    pub patients: Limit,
    /// Workspace members.
    #[serde(default)]
    pub users: Limit,
    /// Pharmacy locations.
    #[serde(default)]
    pub locations: Limit,
    /// Storage in gigabytes.
    #[serde(default)]
    pub storage: Limit,
    /// API calls per month.
    #[serde(default, alias = "apiCalls")]
    pub api_calls: Limit,
}

impl PlanLimits {
    /// Every limit lifted.
    pub fn unlimited() -> Self {
        Self {
            patients: Limit::Unlimited,
            users: Limit::Unlimited,
            locations: Limit::Unlimited,
            storage: Limit::Unlimited,
            api_calls: Limit::Unlimited,
        }
    }
}
