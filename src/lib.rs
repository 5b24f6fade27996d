pub mod config;
pub mod consts;
pub mod error;
pub mod gpio;
pub mod input;
pub mod manager;
pub mod mqtt;
pub mod relay;
