//! Gesture classification for push-button inputs.
//!
//! Each input channel owns one [`ClickClassifier`], driven by a dedicated
//! task: edges arrive over a channel, timing checks are deferred wake-ups on
//! the same task. The classifier itself is a plain state machine with the
//! clock injected, so it is testable without a runtime clock.

use crate::consts::{
    ClickKind, DEBOUNCE_WINDOW, LONG_PRESS_THRESHOLD, POLL_INTERVAL, SECOND_CLICK_WINDOW,
};
use crate::gpio::{Edge, EdgeEvent};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// One classified gesture. Fire-and-forget: produced once per physical
/// gesture, never retried.
#[derive(Clone, Debug)]
pub struct GestureEvent {
    pub channel_id: String,
    pub kind: ClickKind,
    pub at: Instant,
}

/// Result of a scheduled check: possibly a gesture to emit, possibly a
/// follow-up check to schedule.
#[derive(Debug, Default)]
pub struct Check {
    pub emit: Option<ClickKind>,
    pub next_check: Option<Instant>,
}

/// Per-channel press/release state machine classifying gestures as
/// single, double or long clicks.
///
/// All state is owned by one instance per channel; there is nothing shared
/// between channels. A completed gesture resets every field, and a check
/// firing after that reset is a no-op, so stale scheduled checks need no
/// cancellation.
pub struct ClickClassifier {
    channel_id: String,
    pressed: bool,
    first_press_at: Option<Instant>,
    second_press_at: Option<Instant>,
    awaiting_second: bool,
    long_press_fired: bool,
}

impl ClickClassifier {
    pub fn new(channel_id: impl Into<String>) -> Self {
        ClickClassifier {
            channel_id: channel_id.into(),
            pressed: false,
            first_press_at: None,
            second_press_at: None,
            awaiting_second: false,
            long_press_fired: false,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Feed a raw edge. Returns a deadline to schedule a check at, if any.
    pub fn handle_edge(&mut self, edge: Edge, now: Instant) -> Option<Instant> {
        match edge {
            Edge::Press => {
                self.pressed = true;
                self.handle_press(now)
            }
            Edge::Release => {
                // Releases are evaluated by the next scheduled check
                // observing the input inactive.
                self.pressed = false;
                None
            }
        }
    }

    fn handle_press(&mut self, now: Instant) -> Option<Instant> {
        // Already classified as long; wait for release to reset.
        if self.long_press_fired {
            return None;
        }

        if let Some(first) = self.first_press_at {
            if now.saturating_duration_since(first) < DEBOUNCE_WINDOW {
                self.second_press_at = Some(now);
            }
        }

        // A second click joins the gesture already in flight; its probe
        // will classify, nothing more to schedule.
        if self.second_press_at.is_some() {
            return None;
        }

        if self.first_press_at.is_none() {
            self.first_press_at = Some(now);
        }
        Some(now + POLL_INTERVAL)
    }

    /// Run a scheduled check. Elapsed times saturate at zero, so a clock
    /// stepping backwards cannot produce negative intervals.
    pub fn handle_check(&mut self, now: Instant) -> Check {
        // Gesture already finalized; this is a stale check.
        let Some(first) = self.first_press_at else {
            return Check::default();
        };

        if self.pressed {
            let mut emit = None;
            if !self.long_press_fired
                && now.saturating_duration_since(first) >= LONG_PRESS_THRESHOLD
            {
                debug!("Long press on input {}", self.channel_id);
                self.long_press_fired = true;
                emit = Some(ClickKind::Long);
            }
            // Keep polling until release, even after long fired.
            return Check {
                emit,
                next_check: Some(now + POLL_INTERVAL),
            };
        }

        if self.long_press_fired {
            self.reset();
            return Check::default();
        }

        if self.awaiting_second {
            let kind = if self.second_press_at.is_some() {
                ClickKind::Double
            } else {
                ClickKind::Single
            };
            debug!("{} click on input {}", kind.as_str(), self.channel_id);
            self.reset();
            return Check {
                emit: Some(kind),
                next_check: None,
            };
        }

        // First check that sees the button released: give a second click a
        // chance before classifying.
        self.awaiting_second = true;
        Check {
            emit: None,
            next_check: Some(now + SECOND_CLICK_WINDOW),
        }
    }

    fn reset(&mut self) {
        self.first_press_at = None;
        self.second_press_at = None;
        self.awaiting_second = false;
        self.long_press_fired = false;
    }
}

/// Drive one classifier: marshal edges from the hardware side, run its
/// scheduled checks, forward emitted gestures. Returns when the edge source
/// or the gesture consumer goes away.
pub async fn run(
    mut classifier: ClickClassifier,
    mut edges: mpsc::Receiver<EdgeEvent>,
    gestures: mpsc::Sender<GestureEvent>,
) {
    let mut next_check: Option<Instant> = None;
    debug!("Listening for edges on input {}", classifier.channel_id());
    loop {
        tokio::select! {
            event = edges.recv() => {
                let Some(EdgeEvent { edge, at }) = event else {
                    // Edge source closed.
                    break;
                };
                if let Some(deadline) = classifier.handle_edge(edge, at) {
                    next_check = Some(deadline);
                }
            }
            _ = sleep_until(next_check.unwrap_or_else(Instant::now)), if next_check.is_some() => {
                let now = Instant::now();
                let check = classifier.handle_check(now);
                next_check = check.next_check;
                if let Some(kind) = check.emit {
                    let event = GestureEvent {
                        channel_id: classifier.channel_id().to_string(),
                        kind,
                        at: now,
                    };
                    if gestures.send(event).await.is_err() {
                        // Consumer side died.
                        break;
                    }
                }
            }
        }
    }
    debug!("Input task for {} finishing", classifier.channel_id());
}
