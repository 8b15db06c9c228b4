//! Motion controller: one per flight session.
//!
//! Each control tick takes the detector's result for the latest frame and
//! decides between searching, tracking, a discrete move, or nothing:
//!
//! - nothing detected: start the search sweep, unless the vehicle was told to
//!   land. A tick that follows tracking first sends a zero-velocity halt.
//! - `follow`: cancel any sweep and run the visual servo; its velocity
//!   command goes straight to the link.
//! - `land` / `takeoff`: enqueue once per change of label.
//! - moves and rotations: enqueue, debounced per verb.
//!
//! Discrete commands go through the [`CommandDispatcher`]; continuous
//! commands bypass it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::arbiter::{ArbiterState, Behavior};
use crate::command::{Command, Verb, MOVE_RANGE, ROTATION_RANGE};
use crate::config::MotionConfig;
use crate::detection::{DetectionResult, Detector, Directive};
use crate::dispatcher::CommandDispatcher;
use crate::error::{Error, Result};
use crate::link::VehicleLink;
use crate::overlay::Overlay;
use crate::search::SearchController;
use crate::servo::{ServoController, ServoOutput};

/// What one tick did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub label: String,
    pub behavior: Behavior,
    /// Discrete command placed on the queue this tick.
    pub enqueued: Option<Command>,
    /// Continuous command sent directly this tick.
    pub sent: Option<Command>,
    pub servo: Option<ServoOutput>,
    pub overlay: Option<Overlay>,
}

/// Consistent copy of the controller state for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub ticks: u64,
    pub last_label: String,
    pub behavior: Behavior,
    pub landed: bool,
    pub searching: bool,
    pub search_enabled: bool,
    pub search_phase: usize,
    pub queued: Vec<Command>,
    pub dispatched: u64,
    pub failed: u64,
    pub pace: i32,
}

pub struct MotionController<L: VehicleLink> {
    config: MotionConfig,
    link: Arc<L>,
    dispatcher: CommandDispatcher,
    search: SearchController,
    servo: ServoController,
    state: ArbiterState,
}

impl<L: VehicleLink> MotionController<L> {
    pub fn new(link: Arc<L>, config: MotionConfig) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(config.dispatch_interval),
            search: SearchController::new(config.search.clone()),
            servo: ServoController::new(config.servo.clone(), config.frame_center()),
            state: ArbiterState::default(),
            link,
            config,
        }
    }

    /// Start the command dispatcher.
    pub fn start(&mut self) {
        self.dispatcher.start(Arc::clone(&self.link));
    }

    pub fn link(&self) -> &Arc<L> {
        &self.link
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn is_searching(&self) -> bool {
        self.search.is_active()
    }

    /// Run the detector on `frame` and tick with its result. A detector
    /// error counts as an empty frame.
    pub async fn process<F, D: Detector<F>>(&mut self, detector: &mut D, frame: &F) -> TickReport {
        let detection = detector.detect(frame).unwrap_or_else(|e| {
            warn!(error = %e, "detector failed, treating frame as empty");
            DetectionResult::none()
        });
        self.tick(detection).await
    }

    /// One control tick.
    pub async fn tick(&mut self, detection: DetectionResult) -> TickReport {
        let now = Instant::now();
        let label = if detection.is_empty() {
            String::new()
        } else {
            detection.label.trim().to_lowercase()
        };
        let mut report = TickReport {
            tick: self.state.ticks() + 1,
            label: label.clone(),
            behavior: Behavior::Idle,
            enqueued: None,
            sent: None,
            servo: None,
            overlay: None,
        };

        let behavior = if detection.is_empty() {
            self.on_nothing_detected(&mut report).await
        } else {
            self.on_detection(&detection, &label, now, &mut report).await
        };

        self.state.finish_tick(&label, behavior);
        report.behavior = behavior;
        report
    }

    async fn on_nothing_detected(&mut self, report: &mut TickReport) -> Behavior {
        if self.state.landed() {
            return Behavior::Landed;
        }
        if self.state.last_behavior() == Behavior::Tracking {
            let halt = Command::halt();
            self.send_continuous(&halt).await;
            report.sent = Some(halt);
        }
        if !self.search.is_enabled() {
            return Behavior::Idle;
        }
        if !self.search.start(Arc::clone(&self.link)) && !self.search.is_active() {
            return Behavior::Idle;
        }
        Behavior::Searching
    }

    async fn on_detection(
        &mut self,
        detection: &DetectionResult,
        label: &str,
        now: Instant,
        report: &mut TickReport,
    ) -> Behavior {
        if self.search.is_active() {
            self.search.cancel().await;
        }

        let frame_center = self.config.frame_center();
        report.overlay = detection.rect.map(|rect| Overlay::marker(rect, label));

        match detection.directive() {
            Directive::Follow => {
                let Some(rect) = detection.rect else {
                    warn!("follow marker without a box");
                    return Behavior::Idle;
                };
                if self.state.last_behavior() != Behavior::Tracking {
                    self.servo.reset();
                }
                let output = self.servo.update(&rect);
                self.send_continuous(&output.command).await;
                report.sent = Some(output.command);
                report.servo = Some(output);
                report.overlay = Some(Overlay::tracking(rect, label, frame_center));
                Behavior::Tracking
            }
            Directive::Land => {
                if self.state.last_label() != label {
                    self.enqueue(Command::land(), report);
                    self.state.set_landed(true);
                }
                Behavior::Landed
            }
            Directive::TakeOff => {
                if self.state.last_label() != label {
                    self.enqueue(Command::takeoff(), report);
                    self.state.set_landed(false);
                }
                Behavior::DiscreteMove
            }
            Directive::Move(verb) => {
                let window = self.config.debounce_window;
                if self.state.debounce_allows(label, verb, now, window) {
                    let cmd = self.marker_step(verb);
                    if let Err(e) = cmd.validate() {
                        warn!(command = %cmd, error = %e, "refusing marker move");
                        return Behavior::Idle;
                    }
                    self.enqueue(cmd, report);
                    self.state.record_enqueue(verb, now);
                } else {
                    debug!(label, "held marker debounced");
                }
                Behavior::DiscreteMove
            }
            Directive::Unknown => {
                debug!(label, "no action for label");
                Behavior::Idle
            }
        }
    }

    /// Pace doubles as the turn angle, capped at a full turn.
    fn marker_step(&self, verb: Verb) -> Command {
        let amount = if verb.is_rotation() {
            self.config
                .pace
                .clamp(*ROTATION_RANGE.start(), *ROTATION_RANGE.end())
        } else {
            self.config.pace
        };
        Command::step(verb, amount)
    }

    fn enqueue(&self, cmd: Command, report: &mut TickReport) {
        info!(command = %cmd, "queued");
        self.dispatcher.enqueue(cmd);
        report.enqueued = Some(cmd);
    }

    async fn send_continuous(&self, cmd: &Command) {
        let line = cmd.to_string();
        if let Err(e) = self.link.send(&line).await {
            warn!(command = %line, error = %e, "continuous command failed");
        }
    }

    /// Validate and submit a command line from an outside source (operator,
    /// script). Discrete commands are queued, `rc` is sent directly.
    pub async fn submit(&mut self, line: &str) -> Result<Command> {
        let cmd: Command = line.parse()?;
        if cmd.is_continuous() {
            self.link.send(&cmd.to_string()).await?;
            return Ok(cmd);
        }
        match cmd.verb {
            Verb::Land => self.state.set_landed(true),
            Verb::TakeOff => self.state.set_landed(false),
            _ => {}
        }
        info!(command = %cmd, "external command queued");
        self.dispatcher.enqueue(cmd);
        Ok(cmd)
    }

    /// Distance/angle used for marker-driven moves.
    pub fn set_pace(&mut self, pace: i32) -> Result<()> {
        if !MOVE_RANGE.contains(&pace) {
            return Err(Error::invalid_command(format!(
                "pace {} is outside {:?}",
                pace, MOVE_RANGE
            )));
        }
        info!(pace, "pace changed");
        self.config.pace = pace;
        Ok(())
    }

    /// Turn the autonomous search on or off. Turning it off stops a running
    /// sweep.
    pub async fn set_search_enabled(&mut self, enabled: bool) {
        self.search.set_enabled(enabled);
        if !enabled && self.search.is_active() {
            self.search.cancel().await;
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            ticks: self.state.ticks(),
            last_label: self.state.last_label().to_string(),
            behavior: self.state.last_behavior(),
            landed: self.state.landed(),
            searching: self.search.is_active(),
            search_enabled: self.search.is_enabled(),
            search_phase: self.search.phase(),
            queued: self.dispatcher.queue().snapshot(),
            dispatched: self.dispatcher.sent(),
            failed: self.dispatcher.failed(),
            pace: self.config.pace,
        }
    }

    /// Stop background work and close the link.
    pub async fn shutdown(&mut self) {
        self.search.cancel().await;
        self.dispatcher.shutdown().await;
        self.link.close();
        info!("motion controller shut down");
    }
}
