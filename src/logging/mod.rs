// file: src/logging/mod.rs
// version: 1.0.0
// guid: 71c3e8a5-0d4f-4962-b817-f9a2c6d50e38

//! Logging system for the panel agent

pub mod logger;

pub use logger::init_logger;
