//! Event pipeline: wires market ticks into the indicator engine and fans
//! the resulting updates out over the indicator bus, optionally mirroring
//! every snapshot into a time-series store.

pub mod wiring;

pub use wiring::Pipeline;
