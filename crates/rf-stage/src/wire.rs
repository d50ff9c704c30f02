//! Wire format — one UTF-8 line per stage
//!
//! | line         | stage                 |
//! |--------------|-----------------------|
//! | `start`      | [`Stage::Start`]      |
//! | `<float>`    | [`Stage::Outcome`]    |
//! | `first_stop` | [`Stage::FirstStop`]  |
//! | `lose`       | [`Stage::Lose`]       |
//! | `bonus`      | [`Stage::Bonus`]      |
//!
//! The outcome is written as the shortest decimal that round-trips, so a
//! drawn `0.42` goes out as `0.42`.

use thiserror::Error;

use crate::stage::Stage;

/// Errors decoding a wire line
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageParseError {
    #[error("Empty line")]
    Empty,

    #[error("Unknown stage: {0}")]
    Unknown(String),

    #[error("Outcome out of range: {0}")]
    OutOfRange(f64),
}

impl Stage {
    /// Encode to the wire form (no trailing newline)
    pub fn to_line(&self) -> String {
        match self {
            Stage::Outcome { value } => format!("{}", value),
            other => other.type_name().to_string(),
        }
    }

    /// Decode a single wire line (surrounding whitespace ignored)
    pub fn parse_line(line: &str) -> Result<Self, StageParseError> {
        let line = line.trim();
        match line {
            "" => Err(StageParseError::Empty),
            "start" => Ok(Stage::Start),
            "first_stop" => Ok(Stage::FirstStop),
            "lose" => Ok(Stage::Lose),
            "bonus" => Ok(Stage::Bonus),
            other => {
                let value: f64 = other
                    .parse()
                    .map_err(|_| StageParseError::Unknown(other.to_string()))?;
                if !(0.0..1.0).contains(&value) {
                    return Err(StageParseError::OutOfRange(value));
                }
                Ok(Stage::Outcome { value })
            }
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lines() {
        assert_eq!(Stage::Start.to_line(), "start");
        assert_eq!(Stage::FirstStop.to_line(), "first_stop");
        assert_eq!(Stage::Lose.to_line(), "lose");
        assert_eq!(Stage::Bonus.to_line(), "bonus");
    }

    #[test]
    fn test_outcome_line_is_shortest_decimal() {
        assert_eq!(Stage::Outcome { value: 0.42 }.to_line(), "0.42");
        assert_eq!(Stage::Outcome { value: 0.05 }.to_line(), "0.05");
        assert_eq!(Stage::Outcome { value: 0.0 }.to_line(), "0");
    }

    #[test]
    fn test_parse_lines() {
        assert_eq!(Stage::parse_line("bonus\n"), Ok(Stage::Bonus));
        assert_eq!(
            Stage::parse_line(" 0.27 "),
            Ok(Stage::Outcome { value: 0.27 })
        );
        assert_eq!(Stage::parse_line(""), Err(StageParseError::Empty));
        assert_eq!(
            Stage::parse_line("jackpot"),
            Err(StageParseError::Unknown("jackpot".into()))
        );
        assert_eq!(
            Stage::parse_line("1.5"),
            Err(StageParseError::OutOfRange(1.5))
        );
    }
}
