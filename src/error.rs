//! Library error types

use thiserror::Error;

use crate::codec::Region;

/// Errors raised by addressing, subscription and lifecycle operations.
///
/// Stream-level failures (ports, sends) are reported as `anyhow::Error`
/// with context at the MIDI seams instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Index outside the valid range for its region. Never clamped.
    #[error("index {index} out of range for {region} (valid 0..{max})")]
    IndexOutOfRange { region: Region, index: u8, max: u8 },

    /// Region name outside the closed set of three.
    #[error("unknown region '{0}' (expected grid, row or column)")]
    InvalidRegion(String),

    /// `run()` called while the dispatch loop is already (or was) running.
    #[error("dispatch loop has already been started")]
    AlreadyRunning,

    /// Operation needs the event stream, but it was already taken.
    #[error("device event stream is not available")]
    NotConnected,
}
