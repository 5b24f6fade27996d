//! Narrow seams towards the actual hardware. The daemon never talks to pins
//! directly; outputs go through [`OutputPin`] and input transitions arrive
//! as [`EdgeEvent`]s over an mpsc channel, so interrupt/callback contexts
//! never touch classifier or relay state.

use crate::error::HardwareError;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A binary physical output. Implementations must be cheap to call; the
/// manager task is the only caller.
pub trait OutputPin: Send {
    /// Drive the output. An error leaves the previously confirmed state in
    /// place as far as the rest of the system is concerned.
    fn write(&mut self, on: bool) -> Result<(), HardwareError>;
    /// Read back the actual output level.
    fn read(&self) -> bool;
}

/// Raw input transition.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Edge {
    Press,
    Release,
}

/// One transition on one input channel, timestamped at the source.
#[derive(Copy, Clone, Debug)]
pub struct EdgeEvent {
    pub edge: Edge,
    pub at: Instant,
}

/// Channel used to hand edges from a hardware callback into the event loop.
/// The sender side is what a GPIO backend holds in its interrupt context.
pub fn edge_channel() -> (mpsc::Sender<EdgeEvent>, mpsc::Receiver<EdgeEvent>) {
    mpsc::channel(15)
}

/// In-memory output backend. Lets the daemon run (and tests exercise the
/// full actuation path) without board hardware.
#[derive(Debug, Default)]
pub struct VirtualPin {
    on: bool,
}

impl OutputPin for VirtualPin {
    fn write(&mut self, on: bool) -> Result<(), HardwareError> {
        self.on = on;
        Ok(())
    }

    fn read(&self) -> bool {
        self.on
    }
}
