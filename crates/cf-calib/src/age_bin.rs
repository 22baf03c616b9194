//! Half-open age intervals and age-bin selections.

use std::fmt;
use std::str::FromStr;

use cf_core::{Error, Result, Value};
use serde::{Deserialize, Serialize};

/// Delimiter between the bounds of a rendered age bin.
pub const DELIMITER: &str = ":";

/// Legacy delimiter still found in older reference and simulation tables.
pub const LEGACY_DELIMITER: &str = ", ";

/// A half-open age interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgeBin {
    /// Inclusive lower bound.
    pub start: f64,
    /// Exclusive upper bound.
    pub end: f64,
}

impl AgeBin {
    /// `[start, end)`; `end` must exceed `start`.
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() || end <= start {
            return Err(Error::InvalidAgeBin(format!("[{}{}{}) is not a valid interval", start, DELIMITER, end)));
        }
        Ok(Self { start, end })
    }

    /// `true` if `age` lies in the interval.
    pub fn contains(&self, age: f64) -> bool {
        age >= self.start && age < self.end
    }

    /// Rewrite a legacy `[a, b)` label to `[a:b)`; other labels pass through.
    pub fn normalize_label(label: &str) -> String {
        label.replace(LEGACY_DELIMITER, DELIMITER)
    }
}

impl fmt::Display for AgeBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}{}{})", Value::Number(self.start), DELIMITER, Value::Number(self.end))
    }
}

impl FromStr for AgeBin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAgeBin(format!("cannot parse '{}', expected [start:end)", s));
        let inner = s.trim().strip_prefix('[').and_then(|r| r.strip_suffix(')')).ok_or_else(invalid)?;
        let normalized = Self::normalize_label(inner);
        let (start, end) = normalized.split_once(DELIMITER).ok_or_else(invalid)?;
        let start: f64 = start.trim().parse().map_err(|_| invalid())?;
        let end: f64 = end.trim().parse().map_err(|_| invalid())?;
        Self::new(start, end)
    }
}

impl TryFrom<String> for AgeBin {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<AgeBin> for String {
    fn from(bin: AgeBin) -> Self {
        bin.to_string()
    }
}

/// Which age bins an analyzer scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AgeBins {
    /// Every bin present in the reference.
    #[default]
    All,
    /// Only the listed bins.
    Bins(Vec<AgeBin>),
}

impl AgeBins {
    /// Label used when `All` is rendered.
    pub const ALL_LABEL: &'static str = "All";

    /// Rendered bin labels, or `None` for `All`.
    pub fn labels(&self) -> Option<Vec<String>> {
        match self {
            AgeBins::All => None,
            AgeBins::Bins(bins) => Some(bins.iter().map(AgeBin::to_string).collect()),
        }
    }
}

impl fmt::Display for AgeBins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeBins::All => f.write_str(Self::ALL_LABEL),
            AgeBins::Bins(bins) => bins.iter().try_for_each(|b| write!(f, "{}", b)),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AgeBinsRepr {
    One(String),
    Many(Vec<AgeBin>),
}

impl Serialize for AgeBins {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            AgeBins::All => AgeBinsRepr::One(Self::ALL_LABEL.to_string()),
            AgeBins::Bins(bins) => AgeBinsRepr::Many(bins.clone()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AgeBins {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match AgeBinsRepr::deserialize(deserializer)? {
            AgeBinsRepr::One(s) if s.eq_ignore_ascii_case(Self::ALL_LABEL) => Ok(AgeBins::All),
            AgeBinsRepr::One(s) => s.parse().map(|b| AgeBins::Bins(vec![b])).map_err(serde::de::Error::custom),
            AgeBinsRepr::Many(bins) => Ok(AgeBins::Bins(bins)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let bin = AgeBin::new(15.0, 50.0).unwrap();
        assert_eq!(bin.to_string(), "[15:50)");
        assert_eq!("[15:50)".parse::<AgeBin>().unwrap(), bin);
        assert_eq!("[15, 50)".parse::<AgeBin>().unwrap(), bin);
        assert_eq!(AgeBin::new(0.5, 1.0).unwrap().to_string(), "[0.5:1)");
    }

    #[test]
    fn test_invalid_bins() {
        assert!(matches!("15:50".parse::<AgeBin>(), Err(Error::InvalidAgeBin(_))));
        assert!(matches!("[50:15)".parse::<AgeBin>(), Err(Error::InvalidAgeBin(_))));
        assert!(matches!("[a:b)".parse::<AgeBin>(), Err(Error::InvalidAgeBin(_))));
    }

    #[test]
    fn test_contains_is_half_open() {
        let bin = AgeBin::new(0.0, 5.0).unwrap();
        assert!(bin.contains(0.0));
        assert!(bin.contains(4.99));
        assert!(!bin.contains(5.0));
    }

    #[test]
    fn test_age_bins_serde() {
        let all: AgeBins = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, AgeBins::All);
        assert_eq!(all.labels(), None);

        let bins: AgeBins = serde_json::from_str("[\"[15:25)\", \"[25, 50)\"]").unwrap();
        assert_eq!(bins.labels().unwrap(), vec!["[15:25)", "[25:50)"]);
        assert_eq!(bins.to_string(), "[15:25)[25:50)");
        assert_eq!(serde_json::to_string(&bins).unwrap(), "[\"[15:25)\",\"[25:50)\"]");

        let one: AgeBins = serde_json::from_str("\"[0:100)\"").unwrap();
        assert_eq!(one, AgeBins::Bins(vec![AgeBin::new(0.0, 100.0).unwrap()]));
    }
}
