//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels.

pub mod comms;
pub mod persist;

pub use comms::comms_task;
pub use persist::{persist_task, Engine};
