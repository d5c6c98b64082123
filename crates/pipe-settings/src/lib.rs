//! # pipe-settings
//!
//! Configuration for the pipe relay, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`PipeSettings::default()`]
//! 2. **User file**: `~/.pipe/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PIPE_*` overrides (highest priority)
//!
//! The binary applies its CLI flags on top of the loaded value.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
