//! Feedstock runner: resolve declared recipes into runnable objects.
//!
//! Reads a feedstock's `meta.yaml`, resolves its `module:attribute` recipe
//! references, and builds storage targets against whichever constructor the
//! installed target library exposes.

pub mod cli;
pub mod core;
pub mod storage;
