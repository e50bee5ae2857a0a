//! Launchpad macro gateway
//!
//! Translates between the Launchpad's wire protocol (note numbers and
//! control-change indices with brightness-packed data bytes) and logical
//! pad addresses, and dispatches press/release events to registered
//! handlers from a background loop.

pub mod codec;
pub mod config;
pub mod error;
pub mod keymap;
pub mod launchpad;
pub mod midi;
pub mod surface;

pub use codec::{Brightness, PadAddress, PadEdge, Region};
pub use error::Error;
pub use launchpad::LaunchpadDriver;
pub use surface::{PadCallback, PadHandler, RunState, Surface};
