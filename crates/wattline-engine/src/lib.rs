//! The Wattline sampling engine: the polling loop, the voltage-source
//! boundary, and the live-snapshot broadcaster.
//!
//! One [`Monitor`](monitor::Monitor) task is the single writer of the
//! previous-state map and the sole producer into the event store and the
//! broadcast channels. Everything else in the system only reads.

pub mod config;
pub mod monitor;
pub mod simulate;
pub mod source;

pub use config::SharedConfig;
pub use monitor::Monitor;
pub use simulate::SimulatedGrid;
pub use source::{SourceReadError, VoltageSource};
