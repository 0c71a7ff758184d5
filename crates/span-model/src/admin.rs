//! Administrative state of a mirror session.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Administrative state of a mirror session.
///
/// Sessions default to enabled; a disabled session keeps its derived
/// view but downstream renderers stop mirroring for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    #[default]
    Enabled,
    Disabled,
}

impl AdminState {
    /// Returns true if the session is administratively enabled.
    pub const fn is_enabled(&self) -> bool {
        matches!(self, AdminState::Enabled)
    }
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdminState::Enabled => "enabled",
            AdminState::Disabled => "disabled",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AdminState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "enabled" | "up" => Ok(AdminState::Enabled),
            "disabled" | "down" => Ok(AdminState::Disabled),
            _ => Err(ParseError::InvalidAdminState(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_enabled() {
        assert!(AdminState::default().is_enabled());
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("up".parse::<AdminState>().unwrap(), AdminState::Enabled);
        assert_eq!("down".parse::<AdminState>().unwrap(), AdminState::Disabled);
        assert!("standby".parse::<AdminState>().is_err());
    }
}
