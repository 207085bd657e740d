// file: src/cli/mod.rs
// version: 1.0.0
// guid: 4e0b7d29-8c5a-4f16-a3d8-62f9e1b04c57

//! Command line interface

pub mod args;
pub mod commands;
