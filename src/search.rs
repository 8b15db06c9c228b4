//! Search sweep run while no target is visible.
//!
//! The sweep alternates between the rotations of its pattern, holding each
//! phase for the dwell time. Rotations go straight to the link; the dwell
//! timer already spaces them out.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::SearchConfig;
use crate::link::VehicleLink;

/// Upper bound on how long `cancel` waits, in poll intervals, before it
/// aborts the task.
const CANCEL_GRACE_POLLS: u32 = 5;

pub struct SearchController {
    config: SearchConfig,
    active: bool,
    cancel_requested: Arc<AtomicBool>,
    phase: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

struct SweepState {
    phase_index: usize,
    last_rotation_at: Instant,
}

impl SearchController {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            active: false,
            cancel_requested: Arc::new(AtomicBool::new(false)),
            phase: Arc::new(AtomicUsize::new(0)),
            handle: None,
        }
    }

    /// True while a sweep task is alive.
    pub fn is_active(&self) -> bool {
        self.active && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Index into the pattern of the rotation currently held.
    pub fn phase(&self) -> usize {
        self.phase.load(Ordering::Relaxed)
    }

    /// Spawn the sweep unless one is already running or the link is gone.
    /// Returns whether a new sweep was started.
    pub fn start<L: VehicleLink>(&mut self, link: Arc<L>) -> bool {
        if self.is_active() {
            return false;
        }
        if link.is_closed() {
            debug!("vehicle link closed, not starting search");
            return false;
        }
        // a sweep that ended by itself (link closed) leaves a finished handle
        self.handle = None;

        let cancel_requested = Arc::new(AtomicBool::new(false));
        self.cancel_requested = Arc::clone(&cancel_requested);
        self.phase.store(0, Ordering::Relaxed);
        self.handle = Some(tokio::spawn(sweep(
            link,
            self.config.clone(),
            cancel_requested,
            Arc::clone(&self.phase),
        )));
        self.active = true;
        info!("search started");
        true
    }

    /// Request cancellation and wait briefly for the sweep to exit.
    pub async fn cancel(&mut self) {
        self.active = false;
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        self.cancel_requested.store(true, Ordering::SeqCst);

        let grace = self.config.poll * CANCEL_GRACE_POLLS;
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            warn!("search task did not stop in time, aborting");
            handle.abort();
        }
        info!("search cancelled");
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

async fn rotate<L: VehicleLink>(link: &L, cmd: &Command) {
    let line = cmd.to_string();
    match link.send(&line).await {
        Ok(reply) => debug!(command = %line, reply = %reply, "search rotation"),
        Err(e) => warn!(command = %line, error = %e, "search rotation failed"),
    }
}

async fn sweep<L: VehicleLink>(
    link: Arc<L>,
    config: SearchConfig,
    cancel_requested: Arc<AtomicBool>,
    phase: Arc<AtomicUsize>,
) {
    let pattern = config.pattern;
    if link.is_closed() || cancel_requested.load(Ordering::SeqCst) {
        return;
    }
    rotate(link.as_ref(), &pattern[0]).await;
    let mut state = SweepState {
        phase_index: 0,
        last_rotation_at: Instant::now(),
    };

    let mut ticker = tokio::time::interval(config.poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if cancel_requested.load(Ordering::SeqCst) {
            debug!("search sweep cancelled");
            break;
        }
        if link.is_closed() {
            info!("vehicle link closed, search sweep exiting");
            break;
        }
        if state.last_rotation_at.elapsed() >= config.dwell {
            state.phase_index = (state.phase_index + 1) % pattern.len();
            phase.store(state.phase_index, Ordering::Relaxed);
            rotate(link.as_ref(), &pattern[state.phase_index]).await;
            state.last_rotation_at = Instant::now();
        }
    }
}
