// Logs module - Core output capture and log file rotation

mod capture;
pub mod rotation;

pub use capture::LogCapture;
pub use rotation::{rotate_logs, LogFileEntry, LogFileSet, RotationReport};
