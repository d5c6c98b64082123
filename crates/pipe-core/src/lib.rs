//! # pipe-core
//!
//! Shared building blocks for the pipe relay:
//!
//! - [`ids`]: opaque session tokens and member identifiers
//! - [`envelope`]: the checksummed, base64-wrapped server broadcast frame
//! - [`logging`]: `tracing` subscriber initialisation

#![deny(unsafe_code)]

pub mod envelope;
pub mod ids;
pub mod logging;

pub use envelope::{build_envelopes, build_record};
pub use ids::{MemberId, SessionId};
