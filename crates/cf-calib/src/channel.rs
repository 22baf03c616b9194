//! Channel descriptors.

use std::fmt;
use std::str::FromStr;

use cf_core::{Error, Result};

/// How a channel's values relate to population size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    /// A proportion; comparable across populations as-is.
    Fraction,
    /// An absolute count; must be rescaled to the reference population.
    Count,
}

impl ChannelType {
    const ALLOWED: [&'static str; 2] = ["fraction", "count"];

    /// The lowercase tag.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelType::Fraction => "fraction",
            ChannelType::Count => "count",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fraction" => Ok(ChannelType::Fraction),
            "count" => Ok(ChannelType::Count),
            other => Err(Error::InvalidChannelType(format!(
                "channel type is {}, must be one of: {}",
                other,
                Self::ALLOWED.join(", ")
            ))),
        }
    }
}

/// A named measured quantity and its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Column name.
    pub name: String,
    /// Type tag.
    pub kind: ChannelType,
}

impl Channel {
    /// Build a channel from a name and a (case-insensitive) type tag.
    pub fn new(name: impl Into<String>, kind: &str) -> Result<Self> {
        Ok(Self { name: name.into(), kind: kind.parse()? })
    }

    /// Build a channel with an already-parsed type.
    pub fn with_kind(name: impl Into<String>, kind: ChannelType) -> Self {
        Self { name: name.into(), kind }
    }

    /// Count channels are rescaled to the reference population before comparison.
    pub fn needs_pop_scaling(&self) -> bool {
        self.kind == ChannelType::Count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_types() {
        let prevalence = Channel::new("Prevalence", "FRACTION").unwrap();
        assert_eq!(prevalence.kind, ChannelType::Fraction);
        assert!(!prevalence.needs_pop_scaling());

        let on_art = Channel::new("On_ART", "Count").unwrap();
        assert!(on_art.needs_pop_scaling());
        assert_eq!(on_art.kind.to_string(), "count");
    }

    #[test]
    fn test_invalid_channel_type() {
        let err = Channel::new("Prevalence", "ratio").unwrap_err();
        assert!(matches!(err, Error::InvalidChannelType(msg) if msg.contains("ratio")));
    }
}
