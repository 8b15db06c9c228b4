//! Motion core for a marker-following quadrotor.
//!
//! Detections come in once per frame; the [`MotionController`] turns them
//! into vehicle commands. Discrete moves are queued and sent one at a time,
//! the visual servo's velocity commands go out immediately, and a search
//! sweep runs in the background while nothing is in view.

pub mod arbiter;
pub mod client;
pub mod command;
pub mod config;
pub mod controller;
pub mod detection;
pub mod dispatcher;
pub mod error;
pub mod link;
pub mod overlay;
pub mod search;
pub mod servo;

pub use command::{Command, Verb};
pub use config::{MotionConfig, ServerConfig};
pub use controller::{MotionController, Snapshot, TickReport};
pub use detection::{DetectionResult, Detector, Rect};
pub use error::{Error, Result};
pub use link::{AnyLink, VehicleLink};
