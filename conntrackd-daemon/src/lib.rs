//! Conntrackd daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `conntrackd-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod config;
pub mod logging;
pub mod service;
