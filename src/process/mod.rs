// Process module - Core process lifecycle management

pub mod core_config;
mod manager;
pub mod orphan;
pub mod spawner;
mod types;

pub use core_config::{CoreConfig, InboundConfig};
pub use manager::{Process, ProcessManager};
pub use orphan::OrphanScanner;
pub use spawner::{query_version, spawn_core, SpawnedCore};
pub use types::{ExitRecord, ProcessState};
