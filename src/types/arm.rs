use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two tested variations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arm {
    A,
    B,
}

impl Arm {
    pub const ALL: [Arm; 2] = [Arm::A, Arm::B];

    /// The opposite arm.
    pub fn other(self) -> Self {
        match self {
            Arm::A => Arm::B,
            Arm::B => Arm::A,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Arm::A => "Variation A",
            Arm::B => "Variation B",
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arm::A => write!(f, "A"),
            Arm::B => write!(f, "B"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_is_involution() {
        for arm in Arm::ALL {
            assert_ne!(arm, arm.other());
            assert_eq!(arm, arm.other().other());
        }
    }

    #[test]
    fn test_serde_repr() {
        assert_eq!(serde_json::to_string(&Arm::A).unwrap(), "\"A\"");
        let arm: Arm = serde_json::from_str("\"B\"").unwrap();
        assert_eq!(arm, Arm::B);
    }
}
