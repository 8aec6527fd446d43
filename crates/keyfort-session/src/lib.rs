// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tarball-at-rest session storage for the Keyfort security wrapper.
//!
//! Keeps a messenger library's directory of mutable session files encrypted
//! as a single blob on disk, projected into a private scratch directory only
//! while a run is live.

pub mod pack;
pub mod store;

pub use store::{SecureSessionStore, BLOB_VERSION};
