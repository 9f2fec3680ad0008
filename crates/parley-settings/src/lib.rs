//! # parley-settings
//!
//! Client configuration with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ParleySettings::default()`]
//! 2. **User file**: `~/.parley/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PARLEY_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use parley_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("API base: {}", settings.api.base_url);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
