//! # ncpd — Spinel NCP host daemon
//!
//! Connects to a network co-processor over a framed socket and runs the
//! `ncp-core` control state machine against it: initialization, settings
//! replay after resets, keepalives, and deep sleep.

pub mod config;
pub mod device;
pub mod service;
