//! Bar Series Store (C1) and Indicator Engine (C2).
//!
//! Each tracked instrument owns a bounded ring of finalized bars plus a
//! `PendingBar` under a readers-writer lock ([`bar_series::BarSeriesManager`]).
//! On every completed bar, [`engine::IndicatorEngine`] recomputes the
//! instrument's configured indicators as pure functions over a `&[Bar]`
//! suffix and writes rounded values into an [`cache::IndicatorCache`].

pub mod bar_series;
pub mod cache;
pub mod engine;
pub mod indicators;

pub use bar_series::BarSeriesManager;
pub use cache::IndicatorCache;
pub use engine::{all_metadata, IndicatorEngine, IndicatorMetadata, IndicatorUpdateEvent, InstrumentConfig};
pub use indicators::{compute, ComputeSkipped, IndicatorDefinition, IndicatorOutput, IndicatorType};
