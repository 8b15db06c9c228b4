//! Runtime configuration.
//!
//! Defaults are the values the controller was tuned with. Frame size, gains,
//! debounce window, pace, dispatch interval and the search dwell/enable flag
//! can be overridden from `SERVO_*` environment variables; the servo band,
//! limits, smoothing and search poll are fixed at their defaults.

use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::command::{Command, MOVE_RANGE};
use crate::error::{Error, Result};

/// Gains and limits for the visual servo.
#[derive(Debug, Clone, Serialize)]
pub struct ServoConfig {
    pub kp: f64,
    pub kd: f64,
    /// Weight of the fresh error in the low-pass filter; the previous error
    /// gets the remainder.
    pub smoothing: f64,
    pub error_limit: f64,
    pub speed_limit: i32,
    /// Exclusive lower bound of the comfortable-distance band, in px².
    pub min_area: i64,
    /// Exclusive upper bound of the comfortable-distance band, in px².
    pub max_area: i64,
    /// Forward/back nudge applied outside the band.
    pub approach_speed: i32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            kp: 0.2,
            kd: 0.2,
            smoothing: 0.8,
            error_limit: 200.0,
            speed_limit: 100,
            min_area: 20_000,
            max_area: 80_000,
            approach_speed: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchConfig {
    pub enabled: bool,
    /// Rotations issued in turn, one per phase.
    pub pattern: [Command; 2],
    pub dwell: Duration,
    /// How often the sweep wakes up to check for cancellation.
    pub poll: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern: [Command::rotate_cw(20), Command::rotate_ccw(50)],
            dwell: Duration::from_secs(10),
            poll: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MotionConfig {
    pub frame_width: i32,
    pub frame_height: i32,
    pub servo: ServoConfig,
    pub search: SearchConfig,
    /// Minimum spacing between two enqueues of the same held marker.
    pub debounce_window: Duration,
    /// Distance/angle used for marker-driven moves.
    pub pace: i32,
    /// Dispatcher sleep between queue polls.
    pub dispatch_interval: Duration,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            frame_width: 960,
            frame_height: 720,
            servo: ServoConfig::default(),
            search: SearchConfig::default(),
            debounce_window: Duration::from_secs(7),
            pace: 50,
            dispatch_interval: Duration::from_millis(100),
        }
    }
}

impl MotionConfig {
    /// Defaults overridden by `SERVO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = env_parse("SERVO_FRAME_WIDTH")? {
            config.frame_width = v;
        }
        if let Some(v) = env_parse("SERVO_FRAME_HEIGHT")? {
            config.frame_height = v;
        }
        if let Some(v) = env_parse("SERVO_KP")? {
            config.servo.kp = v;
        }
        if let Some(v) = env_parse("SERVO_KD")? {
            config.servo.kd = v;
        }
        if let Some(ms) = env_parse("SERVO_DEBOUNCE_MS")? {
            config.debounce_window = Duration::from_millis(ms);
        }
        if let Some(v) = env_parse("SERVO_PACE")? {
            config.pace = v;
        }
        if let Some(ms) = env_parse("SERVO_DISPATCH_INTERVAL_MS")? {
            config.dispatch_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse("SERVO_SEARCH_DWELL_MS")? {
            config.search.dwell = Duration::from_millis(ms);
        }
        if let Some(v) = env_parse("SERVO_SEARCH_ENABLED")? {
            config.search.enabled = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_width <= 0 || self.frame_height <= 0 {
            return Err(Error::config("frame size must be positive"));
        }
        if !MOVE_RANGE.contains(&self.pace) {
            return Err(Error::config(format!(
                "pace {} is outside {:?}",
                self.pace, MOVE_RANGE
            )));
        }
        if self.servo.min_area >= self.servo.max_area {
            return Err(Error::config("servo min_area must be below max_area"));
        }
        if self.search.poll.is_zero() || self.dispatch_interval.is_zero() {
            return Err(Error::config("poll intervals must be non-zero"));
        }
        for rotation in &self.search.pattern {
            rotation.validate()?;
        }
        Ok(())
    }

    pub fn frame_center(&self) -> (i32, i32) {
        (self.frame_width / 2, self.frame_height / 2)
    }
}

/// Which vehicle link the server drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkKind {
    Udp,
    Serial,
    DryRun,
}

impl FromStr for LinkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "udp" | "tello" => Ok(LinkKind::Udp),
            "serial" => Ok(LinkKind::Serial),
            "dry-run" | "dryrun" | "mock" => Ok(LinkKind::DryRun),
            other => Err(Error::config(format!("unknown link kind `{}`", other))),
        }
    }
}

/// Control server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub link: LinkKind,
    /// Vehicle command address for the UDP link.
    pub vehicle_addr: String,
    /// Local bind address for the UDP link.
    pub local_addr: String,
    pub serial_port: Option<String>,
    pub baud_rate: u32,
    pub link_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parse("PORT")?.unwrap_or(8080),
            link: env_parse("LINK")?.unwrap_or(LinkKind::DryRun),
            vehicle_addr: std::env::var("VEHICLE_ADDR")
                .unwrap_or_else(|_| "192.168.10.1:8889".to_string()),
            local_addr: std::env::var("LOCAL_ADDR").unwrap_or_else(|_| "0.0.0.0:8889".to_string()),
            serial_port: std::env::var("SERIAL_PORT").ok(),
            baud_rate: env_parse("BAUD_RATE")?.unwrap_or(57600),
            link_timeout: Duration::from_millis(env_parse("LINK_TIMEOUT_MS")?.unwrap_or(7000)),
        })
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::config(format!("{}={} is not valid", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = MotionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.frame_center(), (480, 360));
        assert_eq!(config.search.pattern[0].to_string(), "cw 20");
        assert_eq!(config.search.pattern[1].to_string(), "ccw 50");
    }

    #[test]
    fn rejects_bad_pace_and_band() {
        let mut config = MotionConfig::default();
        config.pace = 5;
        assert!(config.validate().is_err());

        let mut config = MotionConfig::default();
        config.servo.min_area = config.servo.max_area;
        assert!(config.validate().is_err());
    }

    #[test]
    fn link_kind_parses() {
        assert_eq!("Tello".parse::<LinkKind>().unwrap(), LinkKind::Udp);
        assert_eq!("serial".parse::<LinkKind>().unwrap(), LinkKind::Serial);
        assert_eq!("dry-run".parse::<LinkKind>().unwrap(), LinkKind::DryRun);
        assert!("carrier-pigeon".parse::<LinkKind>().is_err());
    }
}
