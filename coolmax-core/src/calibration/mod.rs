//! Calibration segment guard
//!
//! At boot the live factory calibration segment is compared with its copy in
//! the calibration backup block. A good live segment is backed up when the
//! copy is missing or stale; a bad one is restored from a good copy when the
//! board supports rewriting it.

pub mod guard;
pub mod segment;

pub use guard::{decide, reconcile, CalibrationReport, Decision};
pub use segment::CalibrationSegment;
