//! CLI command implementations.

pub mod catalog;
pub mod common;
pub mod config;
pub mod init;
pub mod probe;
pub mod simulate;
