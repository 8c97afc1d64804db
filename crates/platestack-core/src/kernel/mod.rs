//! # PlateStack Core Kernel
//!
//! Crate-wide plumbing shared by every subsystem: the top-level
//! [`Error`](error::Error) type with its `Result` alias, and the constants
//! (namespace ids, descriptor suffixes, API version) the plugin system and
//! the CLI agree on.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
