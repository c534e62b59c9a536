// Library exports for the proxy supervisor

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod jobs;
pub mod logs;
pub mod process;
pub mod service;
pub mod traffic;
