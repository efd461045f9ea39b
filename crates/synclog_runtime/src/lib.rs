//! Transport boundary, trace serialization, and formatting for synclog.
//!
//! This crate provides:
//! - [`Requesting`] - In-memory transport turning calls into seed entries and replies
//! - Sealed trace serialization to and from `MessagePack`
//! - [`HumanFormatter`] - One-line-per-entry trace rendering

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod format;
pub mod requesting;
pub mod serialize;

pub use format::{HumanFormatter, TraceFormatter};
pub use requesting::{REQUEST, RESPOND, Reply, Requesting};
pub use serialize::{from_bytes, load_from_file, save_to_file, to_bytes};
