use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a key is retained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    Direct,
    Recursive,
    Indirect,
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Recursive => write!(f, "recursive"),
            Self::Indirect => write!(f, "indirect"),
        }
    }
}

impl FromStr for PinMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "recursive" => Ok(Self::Recursive),
            "indirect" => Ok(Self::Indirect),
            other => Err(format!("unknown pin mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_roundtrip() {
        for mode in [PinMode::Direct, PinMode::Recursive, PinMode::Indirect] {
            assert_eq!(mode.to_string().parse::<PinMode>().unwrap(), mode);
        }
        assert!("all".parse::<PinMode>().is_err());
    }
}
