//! Shared data structures for the telemetry risk engine
//!
//! - `sample`: Signal, RawSample (untrusted input), Sample (validated)
//! - `trend`: per-signal rolling statistics
//! - `risk`: findings, scores, bands, fleet ranking

mod risk;
mod sample;
mod trend;

pub use risk::*;
pub use sample::*;
pub use trend::*;
