mod connection;
pub mod discovery;
mod message;

pub use connection::{Bus, Initiator};
pub use message::{Incoming, Outgoing};
