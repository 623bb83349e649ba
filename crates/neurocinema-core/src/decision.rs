//! Decision engine: compare two window means and pick an ending
//!
//! Lower mean band power on a clip is read as stronger engagement with that
//! clip's content. Clip 1 is the calm candidate, clip 2 the excited one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The binary outcome of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Calm,
    Excited,
}

impl Choice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::Calm => "calm",
            Choice::Excited => "excited",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected choice value from an external caller
#[derive(Debug, Error, PartialEq, Eq)]
#[error("choice must be \"calm\" or \"excited\", got {0:?}")]
pub struct InvalidChoice(pub String);

impl FromStr for Choice {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "calm" => Ok(Choice::Calm),
            "excited" => Ok(Choice::Excited),
            _ => Err(InvalidChoice(s.to_string())),
        }
    }
}

/// Compare the two window means and pick the ending.
///
/// Either mean may be NaN ("no data"). Missing data on one side yields the
/// other side's choice; missing data on both sides defaults to calm. A tie
/// favors calm. Pure and total.
pub fn decide(mean_calm: f64, mean_excited: f64) -> Choice {
    match (mean_calm.is_nan(), mean_excited.is_nan()) {
        (true, true) => Choice::Calm,
        (true, false) => Choice::Excited,
        (false, true) => Choice::Calm,
        (false, false) => {
            if mean_calm <= mean_excited {
                Choice::Calm
            } else {
                Choice::Excited
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_undefined_defaults_to_calm() {
        assert_eq!(decide(f64::NAN, f64::NAN), Choice::Calm);
    }

    #[test]
    fn test_missing_calm_side_picks_excited() {
        assert_eq!(decide(f64::NAN, 5.0), Choice::Excited);
    }

    #[test]
    fn test_missing_excited_side_picks_calm() {
        assert_eq!(decide(5.0, f64::NAN), Choice::Calm);
    }

    #[test]
    fn test_tie_favors_calm() {
        assert_eq!(decide(3.0, 3.0), Choice::Calm);
    }

    #[test]
    fn test_lower_alpha_wins() {
        assert_eq!(decide(3.0, 2.0), Choice::Excited);
        assert_eq!(decide(2.0, 3.0), Choice::Calm);
    }

    #[test]
    fn test_choice_parses_case_insensitively() {
        assert_eq!("calm".parse::<Choice>().unwrap(), Choice::Calm);
        assert_eq!("EXCITED".parse::<Choice>().unwrap(), Choice::Excited);
        assert!("thrilled".parse::<Choice>().is_err());
        assert!("".parse::<Choice>().is_err());
    }

    #[test]
    fn test_choice_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Choice::Calm).unwrap(), "\"calm\"");
        assert_eq!(
            serde_json::to_string(&Choice::Excited).unwrap(),
            "\"excited\""
        );
    }
}
