//! # Sealwire Platform
//!
//! Shared types for the sealwire SSH core.
//!
//! This crate provides the unified error type (`SealError`, `SealResult`)
//! used by every layer of packet protection and host trust verification.
//!
//! # Examples
//!
//! ```
//! use sealwire_platform::{SealError, SealResult};
//!
//! fn read_flag(data: &[u8]) -> SealResult<u8> {
//!     data.first().copied().ok_or(SealError::IncompleteData {
//!         needed: 1,
//!         available: 0,
//!     })
//! }
//!
//! # fn main() -> SealResult<()> {
//! assert_eq!(read_flag(&[7])?, 7);
//! assert!(read_flag(&[]).unwrap_err().is_incomplete());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;

pub use error::{SealError, SealResult};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
