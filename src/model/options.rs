//! Menu branch keys and the `optionsTarget` routing table.
//!
//! A menu node routes the caller by the digit entered (`"1".."N"`) or by one
//! of two sentinels: `NI` (no input) and `NM` (no match).

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::IvrFlowError;

const NO_INPUT: &str = "NI";
const NO_MATCH: &str = "NM";

/// Highest numeric option a menu may route. Keys and declared counts above it
/// are dropped on import and never generated on export.
pub const MAX_MENU_OPTIONS: u32 = 99;

/// A key of a menu's `optionsTarget` table.
///
/// Ordering is numeric for digits (`2 < 10`), followed by `NI` then `NM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    Digit(u32),
    NoInput,
    NoMatch,
}

impl OptionKey {
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, OptionKey::Digit(_))
    }

    /// Sentinels, and digits in `1..=MAX_MENU_OPTIONS`.
    pub fn is_routable(&self) -> bool {
        match self {
            OptionKey::Digit(n) => (1..=MAX_MENU_OPTIONS).contains(n),
            _ => true,
        }
    }

    /// Label shown on the editor edge for this branch.
    pub fn label(&self) -> String {
        match self {
            OptionKey::Digit(n) => format!("Option {}", n),
            OptionKey::NoInput => "No Input".to_string(),
            OptionKey::NoMatch => "No Match".to_string(),
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            OptionKey::Digit(n) => write!(f, "{}", n),
            OptionKey::NoInput => f.write_str(NO_INPUT),
            OptionKey::NoMatch => f.write_str(NO_MATCH),
        }
    }
}

impl FromStr for OptionKey {
    type Err = IvrFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            NO_INPUT => Ok(OptionKey::NoInput),
            NO_MATCH => Ok(OptionKey::NoMatch),
            _ => s.parse::<u32>().map(OptionKey::Digit).map_err(|_| IvrFlowError::Convert(format!("invalid menu option key '{}'", s))),
        }
    }
}

impl Serialize for OptionKey {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OptionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A menu's routing table, keyed by [`OptionKey`], valued by target node ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionsTarget(BTreeMap<OptionKey, String>);

impl OptionsTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        key: &OptionKey,
    ) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(
        &mut self,
        key: OptionKey,
        target: impl Into<String>,
    ) {
        self.0.insert(key, target.into());
    }

    /// Sets `key` only when it has no non-empty value yet.
    pub fn fill(
        &mut self,
        key: OptionKey,
        target: &str,
    ) {
        let slot = self.0.entry(key).or_default();
        if slot.is_empty() {
            *slot = target.to_string();
        }
    }

    pub fn contains(
        &self,
        key: &OptionKey,
    ) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Entries in key order: digits ascending, then `NI`, `NM`.
    pub fn iter(&self) -> impl Iterator<Item = (&OptionKey, &String)> {
        self.0.iter()
    }

    /// The numeric option keys in ascending numeric order.
    pub fn digits(&self) -> Vec<u32> {
        self.0
            .keys()
            .filter_map(|k| match k {
                OptionKey::Digit(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    /// Highest numeric key, or 0 when the table has none.
    pub fn max_digit(&self) -> u32 {
        self.digits().last().copied().unwrap_or(0)
    }
}

impl FromIterator<(OptionKey, String)> for OptionsTarget {
    fn from_iter<T: IntoIterator<Item = (OptionKey, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
