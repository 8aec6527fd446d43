// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading, validation, and on-disk path layout for Keyfort.

pub mod loader;
pub mod model;
pub mod paths;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::KeyfortConfig;
pub use paths::KeyfortPaths;
pub use validation::validate;
