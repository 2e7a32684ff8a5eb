//! Maturity profile classification from the global percentage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ScoringError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaturityLevel {
    Beginner,
    Emergent,
    Challenger,
    Leader,
}

/// Inclusive upper bound of each band, checked in ascending order.
const BANDS: [(f64, MaturityLevel); 3] = [
    (25.0, MaturityLevel::Beginner),
    (50.0, MaturityLevel::Emergent),
    (75.0, MaturityLevel::Challenger),
];

impl MaturityLevel {
    pub const ALL: [MaturityLevel; 4] = [
        Self::Beginner,
        Self::Emergent,
        Self::Challenger,
        Self::Leader,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Emergent => "emergent",
            Self::Challenger => "challenger",
            Self::Leader => "leader",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Beginner => "Beginner - initiation phase",
            Self::Emergent => "Emergent - digitalization underway",
            Self::Challenger => "Challenger - advanced transformation",
            Self::Leader => "Leader - digital excellence",
        }
    }

    /// Minimum pillar depth expected of every dimension at this level.
    pub fn target_pillar(self) -> u32 {
        match self {
            Self::Beginner => 1,
            Self::Emergent => 2,
            Self::Challenger => 3,
            Self::Leader => 4,
        }
    }
}

impl fmt::Display for MaturityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaturityLevel {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| ScoringError::config(format!("unknown maturity level '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaturityProfile {
    pub level: MaturityLevel,
    pub percentage: f64,
    pub description: String,
}

/// Map a global percentage onto its maturity band. Input is not clamped.
pub fn classify(global_percentage: f64) -> MaturityProfile {
    let level = BANDS
        .iter()
        .find(|(upper, _)| global_percentage <= *upper)
        .map(|(_, level)| *level)
        .unwrap_or(MaturityLevel::Leader);
    MaturityProfile {
        level,
        percentage: global_percentage,
        description: level.description().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries_are_inclusive_upper() {
        assert_eq!(classify(0.0).level, MaturityLevel::Beginner);
        assert_eq!(classify(25.0).level, MaturityLevel::Beginner);
        assert_eq!(classify(25.01).level, MaturityLevel::Emergent);
        assert_eq!(classify(50.0).level, MaturityLevel::Emergent);
        assert_eq!(classify(50.01).level, MaturityLevel::Challenger);
        assert_eq!(classify(75.0).level, MaturityLevel::Challenger);
        assert_eq!(classify(75.01).level, MaturityLevel::Leader);
        assert_eq!(classify(100.0).level, MaturityLevel::Leader);
    }

    #[test]
    fn profile_carries_description_and_percentage() {
        let profile = classify(42.5);
        assert_eq!(profile.percentage, 42.5);
        assert_eq!(profile.description, "Emergent - digitalization underway");
    }

    #[test]
    fn parses_known_levels_only() {
        assert_eq!("leader".parse::<MaturityLevel>().unwrap(), MaturityLevel::Leader);
        let err = "expert".parse::<MaturityLevel>().unwrap_err();
        assert!(matches!(err, ScoringError::Config(_)));
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&MaturityLevel::Challenger).unwrap();
        assert_eq!(json, "\"challenger\"");
    }
}
