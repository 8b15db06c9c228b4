//! Flight commands and their textual wire form.
//!
//! Every command renders to the vehicle's line grammar: bare verbs
//! (`takeoff`, `land`), `<verb> <arg>` for moves and rotations
//! (`forward 50`, `cw 20`) and `rc <lr> <fb> <ud> <yaw>` for the continuous
//! velocity command used while servoing.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Accepted distance for linear moves, in centimetres.
pub const MOVE_RANGE: RangeInclusive<i32> = 20..=500;
/// Accepted angle for rotations, in degrees.
pub const ROTATION_RANGE: RangeInclusive<i32> = 1..=360;
/// Accepted value for each `rc` channel.
pub const SPEED_RANGE: RangeInclusive<i32> = -100..=100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    TakeOff,
    Land,
    Up,
    Down,
    Left,
    Right,
    Forward,
    Back,
    RotateCw,
    RotateCcw,
    /// Velocity vector: left/right, forward/back, up/down, yaw.
    Follow(i32, i32, i32, i32),
}

impl Verb {
    /// Looks up a discrete verb by its keyword (`"forward"`, `"cw"`, ...).
    pub fn from_keyword(keyword: &str) -> Option<Verb> {
        let verb = match keyword {
            "takeoff" => Verb::TakeOff,
            "land" => Verb::Land,
            "up" => Verb::Up,
            "down" => Verb::Down,
            "left" => Verb::Left,
            "right" => Verb::Right,
            "forward" => Verb::Forward,
            "back" => Verb::Back,
            "cw" => Verb::RotateCw,
            "ccw" => Verb::RotateCcw,
            _ => return None,
        };
        Some(verb)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Verb::TakeOff => "takeoff",
            Verb::Land => "land",
            Verb::Up => "up",
            Verb::Down => "down",
            Verb::Left => "left",
            Verb::Right => "right",
            Verb::Forward => "forward",
            Verb::Back => "back",
            Verb::RotateCw => "cw",
            Verb::RotateCcw => "ccw",
            Verb::Follow(..) => "rc",
        }
    }

    pub fn is_linear(&self) -> bool {
        matches!(
            self,
            Verb::Up | Verb::Down | Verb::Left | Verb::Right | Verb::Forward | Verb::Back
        )
    }

    pub fn is_rotation(&self) -> bool {
        matches!(self, Verb::RotateCw | Verb::RotateCcw)
    }
}

/// A single command for the vehicle. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub verb: Verb,
    pub arg: Option<i32>,
}

impl Command {
    pub fn new(verb: Verb, arg: Option<i32>) -> Self {
        Self { verb, arg }
    }

    pub fn takeoff() -> Self {
        Self::new(Verb::TakeOff, None)
    }

    pub fn land() -> Self {
        Self::new(Verb::Land, None)
    }

    /// Linear move or rotation with its distance/angle.
    pub fn step(verb: Verb, amount: i32) -> Self {
        Self::new(verb, Some(amount))
    }

    pub fn rotate_cw(degrees: i32) -> Self {
        Self::step(Verb::RotateCw, degrees)
    }

    pub fn rotate_ccw(degrees: i32) -> Self {
        Self::step(Verb::RotateCcw, degrees)
    }

    pub fn follow(lr: i32, fb: i32, ud: i32, yaw: i32) -> Self {
        Self::new(Verb::Follow(lr, fb, ud, yaw), None)
    }

    /// Zero-velocity command that stops any drift left by servoing.
    pub fn halt() -> Self {
        Self::follow(0, 0, 0, 0)
    }

    /// Continuous commands bypass the dispatch queue.
    pub fn is_continuous(&self) -> bool {
        matches!(self.verb, Verb::Follow(..))
    }

    /// Checks the argument against what the vehicle accepts for the verb.
    pub fn validate(&self) -> Result<()> {
        match (self.verb, self.arg) {
            (Verb::TakeOff | Verb::Land, None) => Ok(()),
            (Verb::Follow(lr, fb, ud, yaw), None) => {
                if [lr, fb, ud, yaw].iter().all(|v| SPEED_RANGE.contains(v)) {
                    Ok(())
                } else {
                    Err(Error::invalid_command(format!(
                        "{}: speeds must be within {:?}",
                        self, SPEED_RANGE
                    )))
                }
            }
            (verb, Some(arg)) if verb.is_linear() => check_range(self, arg, MOVE_RANGE),
            (verb, Some(arg)) if verb.is_rotation() => check_range(self, arg, ROTATION_RANGE),
            _ => Err(Error::invalid_command(format!(
                "{}: wrong number of arguments",
                self
            ))),
        }
    }
}

fn check_range(cmd: &Command, arg: i32, range: RangeInclusive<i32>) -> Result<()> {
    if range.contains(&arg) {
        Ok(())
    } else {
        Err(Error::invalid_command(format!(
            "{}: {} is outside {:?}",
            cmd, arg, range
        )))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.verb, self.arg) {
            (Verb::Follow(lr, fb, ud, yaw), _) => write!(f, "rc {} {} {} {}", lr, fb, ud, yaw),
            (verb, Some(arg)) => write!(f, "{} {}", verb.keyword(), arg),
            (verb, None) => f.write_str(verb.keyword()),
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    /// Parses and validates a command line such as `"forward 50"`.
    fn from_str(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let (keyword, args) = parts
            .split_first()
            .ok_or_else(|| Error::invalid_command("empty command"))?;
        let keyword = keyword.to_lowercase();

        let numbers = args
            .iter()
            .map(|a| a.parse::<i32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::invalid_command(format!("{}: arguments must be integers", line)))?;

        let cmd = if keyword == "rc" {
            match numbers[..] {
                [lr, fb, ud, yaw] => Command::follow(lr, fb, ud, yaw),
                _ => return Err(Error::invalid_command(format!("{}: rc takes 4 values", line))),
            }
        } else {
            let verb = Verb::from_keyword(&keyword)
                .ok_or_else(|| Error::invalid_command(format!("unknown verb `{}`", keyword)))?;
            match numbers[..] {
                [] => Command::new(verb, None),
                [arg] => Command::new(verb, Some(arg)),
                _ => return Err(Error::invalid_command(format!("{}: too many arguments", line))),
            }
        };

        cmd.validate()?;
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_vehicle_grammar() {
        assert_eq!(Command::takeoff().to_string(), "takeoff");
        assert_eq!(Command::step(Verb::Forward, 50).to_string(), "forward 50");
        assert_eq!(Command::rotate_ccw(50).to_string(), "ccw 50");
        assert_eq!(Command::follow(0, 15, -3, 7).to_string(), "rc 0 15 -3 7");
    }

    #[test]
    fn parses_valid_lines() {
        assert_eq!("land".parse::<Command>().unwrap(), Command::land());
        assert_eq!(
            "  FORWARD 70 ".parse::<Command>().unwrap(),
            Command::step(Verb::Forward, 70)
        );
        assert_eq!("cw 360".parse::<Command>().unwrap(), Command::rotate_cw(360));
        assert_eq!(
            "rc 0 -100 100 5".parse::<Command>().unwrap(),
            Command::follow(0, -100, 100, 5)
        );
    }

    #[test]
    fn rejects_out_of_range_arguments() {
        assert!("up 19".parse::<Command>().is_err());
        assert!("back 501".parse::<Command>().is_err());
        assert!("ccw 0".parse::<Command>().is_err());
        assert!("cw 361".parse::<Command>().is_err());
        assert!("rc 0 0 101 0".parse::<Command>().is_err());
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!("".parse::<Command>().is_err());
        assert!("flip l".parse::<Command>().is_err());
        assert!("forward".parse::<Command>().is_err());
        assert!("forward fifty".parse::<Command>().is_err());
        assert!("takeoff 20".parse::<Command>().is_err());
        assert!("left 20 30".parse::<Command>().is_err());
        assert!("rc 1 2 3".parse::<Command>().is_err());
    }

    #[test]
    fn only_follow_is_continuous() {
        assert!(Command::halt().is_continuous());
        assert!(!Command::land().is_continuous());
        assert!(!Command::rotate_cw(20).is_continuous());
    }
}
