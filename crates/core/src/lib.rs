//! Core functionality for the LatticeGuard attestation engine.
//!
//! This crate provides the fundamental types, error taxonomy, logging and
//! configuration utilities shared across the LatticeGuard workspace.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod wire;

pub use config::Config;
pub use error::{Error, Result};
pub use types::{unix_millis, DeviceSerial, Nonce, RegionId, SessionId};
pub use wire::PayloadBuilder;
