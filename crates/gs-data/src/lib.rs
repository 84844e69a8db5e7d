//! Durable storage for GemmSweep result matrices.
//!
//! Each named sweep configuration owns one JSON file under the store root.
//! Files are written once by the sweep and only read afterwards.

pub mod storage;

pub use storage::*;
