//! # Halyard Proto
//!
//! SSH transport core for the Halyard ecosystem: the key exchange and user
//! authentication state machines, their wire messages, and the cryptographic
//! leaves they stand on.
//!
//! See the [`ssh`] module for the full architecture.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod ssh;
