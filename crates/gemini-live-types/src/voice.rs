use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Prebuilt voices offered by the Live API.
#[derive(Debug, Clone, PartialEq)]
pub enum Voice {
    Puck,
    Charon,
    Kore,
    Fenrir,
    Aoede,
    Zephyr,
    Custom(String),
}

impl Voice {
    pub fn as_str(&self) -> &str {
        match self {
            Voice::Puck => "Puck",
            Voice::Charon => "Charon",
            Voice::Kore => "Kore",
            Voice::Fenrir => "Fenrir",
            Voice::Aoede => "Aoede",
            Voice::Zephyr => "Zephyr",
            Voice::Custom(s) => s,
        }
    }
}

impl From<&str> for Voice {
    fn from(s: &str) -> Self {
        match s {
            "Puck" => Voice::Puck,
            "Charon" => Voice::Charon,
            "Kore" => Voice::Kore,
            "Fenrir" => Voice::Fenrir,
            "Aoede" => Voice::Aoede,
            "Zephyr" => Voice::Zephyr,
            _ => Voice::Custom(s.to_string()),
        }
    }
}

impl FromStr for Voice {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Voice::from(s))
    }
}

impl Serialize for Voice {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Voice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Voice::from(s.as_str()))
    }
}
