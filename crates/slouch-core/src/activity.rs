//! User-declared activity, the third bucketing dimension.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the user says they are doing while seated.
///
/// "Unset" is modelled as `Option::<Activity>::None` at the call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    Work,
    Study,
    Entertainment,
}

impl Activity {
    pub const ALL: [Self; 3] = [Self::Work, Self::Study, Self::Entertainment];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Study => "study",
            Self::Entertainment => "entertainment",
        }
    }

    /// Parses an inbound activity label where `unset` (or an empty label)
    /// clears the activity.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, UnknownActivity> {
        match s {
            "" | "unset" | "none" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activity {
    type Err = UnknownActivity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(Self::Work),
            "study" => Ok(Self::Study),
            "entertainment" => Ok(Self::Entertainment),
            _ => Err(UnknownActivity(s.to_string())),
        }
    }
}

impl Serialize for Activity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Activity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown activity labels.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown activity: {0}")]
pub struct UnknownActivity(String);
