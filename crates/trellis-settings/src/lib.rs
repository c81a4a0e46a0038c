//! # trellis-settings
//!
//! Configuration management with layered sources for the Trellis service.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`TrellisSettings::default()`]
//! 2. **User file**: `~/.trellis/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TRELLIS_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, load_settings, load_settings_from_path, resolve_db_path, settings_dir,
    settings_path,
};
pub use types::*;
