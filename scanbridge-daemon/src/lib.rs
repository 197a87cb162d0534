//! # scanbridge-daemon — demo capture daemon
//!
//! Foreground process that runs the full capture pipeline over a
//! synthetic in-memory display: an animator thread paints and damages
//! the surface the way a busy desktop would, and a consumer loop pops
//! the resulting drawables, logs throughput, and releases the buffers.
//!
//! Useful for exercising the pipeline end to end without a native
//! display connection, and as a template for wiring a real one.

pub mod config;
pub mod demo;
