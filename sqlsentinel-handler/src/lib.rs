//! sqlsentinel handler library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `sqlsentinel-handler` is used as a binary (main.rs).

pub mod cli;
pub mod handler;
pub mod logging;
