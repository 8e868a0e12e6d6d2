//! # Halyard Platform
//!
//! Core platform types and utilities for the Halyard SSH ecosystem.
//!
//! This crate provides:
//! - Unified error types (`HalyardError`, `HalyardResult`)
//!
//! # Examples
//!
//! ```
//! use halyard_platform::{HalyardError, HalyardResult};
//!
//! fn example_function() -> HalyardResult<String> {
//!     Ok("Hello, Halyard!".to_string())
//! }
//!
//! # fn main() -> HalyardResult<()> {
//! let result = example_function()?;
//! assert_eq!(result, "Hello, Halyard!");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;

pub use error::{HalyardError, HalyardResult};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
