//! Console host for the kiosk voice controller.
//!
//! Stands in for the kiosk UI and the browser speech APIs: typed lines play
//! the part of recognised speech, replies are printed and "spoken" with a
//! delay proportional to their length, and actions move a console screen.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;

// Used by main.rs
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod cli;
pub mod console;

pub use bootstrap::{KioskApp, bootstrap};
pub use cli::Cli;
