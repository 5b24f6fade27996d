use crate::error::HardwareError;
use crate::gpio::OutputPin;
use tracing::debug;

/// One binary output channel. Owned by the manager; every mutation goes
/// through the manager's serialized command path.
pub struct Relay {
    id: String,
    pin: Box<dyn OutputPin>,
}

impl Relay {
    pub fn new(id: impl Into<String>, pin: Box<dyn OutputPin>) -> Self {
        Relay { id: id.into(), pin }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Actual output level, read back from the pin.
    pub fn is_active(&self) -> bool {
        self.pin.read()
    }

    pub fn turn_on(&mut self) -> Result<(), HardwareError> {
        debug!("Relay {} on", self.id);
        self.pin.write(true)
    }

    pub fn turn_off(&mut self) -> Result<(), HardwareError> {
        debug!("Relay {} off", self.id);
        self.pin.write(false)
    }

    /// Read the current state and write the opposite.
    pub fn toggle(&mut self) -> Result<(), HardwareError> {
        if self.is_active() {
            self.turn_off()
        } else {
            self.turn_on()
        }
    }
}
