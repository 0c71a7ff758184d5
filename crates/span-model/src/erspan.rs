//! ERSPAN encapsulation version.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ERSPAN header version used when encapsulating mirrored traffic
/// toward a session destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErspanVersion {
    V1,
    #[default]
    V2,
}

impl ErspanVersion {
    /// Returns the on-wire version number.
    pub const fn as_u8(&self) -> u8 {
        match self {
            ErspanVersion::V1 => 1,
            ErspanVersion::V2 => 2,
        }
    }
}

impl fmt::Display for ErspanVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u8())
    }
}

impl TryFrom<u8> for ErspanVersion {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ErspanVersion::V1),
            2 => Ok(ErspanVersion::V2),
            other => Err(ParseError::InvalidErspanVersion(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_conversions() {
        assert_eq!(ErspanVersion::try_from(1).unwrap(), ErspanVersion::V1);
        assert_eq!(ErspanVersion::V2.as_u8(), 2);
        assert!(ErspanVersion::try_from(3).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ErspanVersion::V1.to_string(), "v1");
    }
}
