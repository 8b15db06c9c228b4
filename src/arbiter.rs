//! Move arbiter bookkeeping: the previous label, when each discrete move
//! was last enqueued, and the behavior chosen on the previous tick.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::command::Verb;

/// Behavior chosen for one control tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    #[default]
    Idle,
    Searching,
    Tracking,
    DiscreteMove,
    Landed,
}

#[derive(Debug, Default)]
pub struct ArbiterState {
    last_label: String,
    last_command_time: HashMap<Verb, Instant>,
    last_behavior: Behavior,
    /// Set by an enqueued landing, cleared by an enqueued takeoff.
    landed: bool,
    ticks: u64,
}

impl ArbiterState {
    pub fn last_label(&self) -> &str {
        &self.last_label
    }

    pub fn last_behavior(&self) -> Behavior {
        self.last_behavior
    }

    pub fn landed(&self) -> bool {
        self.landed
    }

    pub fn set_landed(&mut self, landed: bool) {
        self.landed = landed;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// A changed label always passes; the same label passes again once
    /// `window` has elapsed since its last enqueue.
    pub fn debounce_allows(&self, label: &str, verb: Verb, now: Instant, window: Duration) -> bool {
        if label != self.last_label {
            return true;
        }
        match self.last_command_time.get(&verb) {
            Some(at) => now.saturating_duration_since(*at) >= window,
            None => true,
        }
    }

    pub fn record_enqueue(&mut self, verb: Verb, now: Instant) {
        self.last_command_time.insert(verb, now);
    }

    /// Close the tick: the current label becomes the previous one.
    pub fn finish_tick(&mut self, label: &str, behavior: Behavior) {
        label.clone_into(&mut self.last_label);
        self.last_behavior = behavior;
        self.ticks += 1;
    }
}
