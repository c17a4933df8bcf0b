//! Command implementations for the amlrun CLI.

pub mod settings;
pub mod submit;
pub mod types;

pub use types::{LaunchArgs, PlatformArgs};
