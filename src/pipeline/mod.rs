//! Conversion stages below the orchestrator.
//!
//! ## Data Flow
//!
//! ```text
//! staged input ──▶ plan ──▶ engine | native ──▶ result store
//!                 (pair → strategy)  (subprocess or in-process)
//! ```
//!
//! 1. [`plan`]  : map a `(source, target)` pair and the configured backend
//!    to a [`plan::ConversionStrategy`]
//! 2. [`engine`]: run the headless office suite for each engine step,
//!    locate its output and move it into place
//! 3. [`native`]: text-extraction fallback that needs no external binary

pub mod engine;
pub mod native;
pub mod plan;
