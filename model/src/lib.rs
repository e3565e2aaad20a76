use std::{fmt, str::FromStr};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

mod record;

pub use record::{PriceRecord, ValidationError};
pub use typed_floats::tf64::StrictlyPositiveFinite as Price;

/// Tracked phone variants. All of them are the 256GB configuration.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    DeserializeFromStr,
    SerializeDisplay,
    ValueEnum,
)]
pub enum Model {
    #[value(name = "15")]
    Iphone15ProMax,
    #[value(name = "16")]
    Iphone16ProMax,
    #[value(name = "17")]
    Iphone17ProMax,
}

impl Model {
    pub fn all() -> Vec<Self> {
        vec![Self::Iphone15ProMax, Self::Iphone16ProMax, Self::Iphone17ProMax]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Iphone15ProMax => "iPhone 15 Pro Max",
            Self::Iphone16ProMax => "iPhone 16 Pro Max",
            Self::Iphone17ProMax => "iPhone 17 Pro Max",
        }
    }

    pub fn generation(&self) -> u8 {
        match self {
            Self::Iphone15ProMax => 15,
            Self::Iphone16ProMax => 16,
            Self::Iphone17ProMax => 17,
        }
    }

    pub fn capacity(&self) -> &'static str {
        "256GB"
    }

    pub fn slug(&self) -> String {
        self.name().to_lowercase().replace(' ', "-")
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Model {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|x| x.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownModel(s.to_string()))
    }
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    AppleRefurbished,
    Reebelo,
}

impl Source {
    pub fn all() -> Vec<Self> {
        vec![Self::AppleRefurbished, Self::Reebelo]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AppleRefurbished => "Apple Certified Refurbished",
            Self::Reebelo => "Reebelo",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Self::AppleRefurbished => "apple_refurbished",
            Self::Reebelo => "reebelo",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Source {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "apple_refurbished" => Self::AppleRefurbished,
            "reebelo" => Self::Reebelo,
            _ => return Err(ValidationError::UnknownSource(s.to_string())),
        })
    }
}
