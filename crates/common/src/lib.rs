//! Shared utilities, configuration, and error handling for Parley
//!
//! This crate provides common functionality used across the Parley workspace:
//! - Configuration management following 12-factor principles
//! - Error types and handling
//! - State machine error types

pub mod config;
pub mod error;
pub mod state;

pub use config::{Config, StoreProvider};
pub use error::{Error, Result};
pub use state::StateError;
