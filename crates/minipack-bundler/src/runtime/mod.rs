// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bundle runtime
//!
//! Every emitted bundle embeds a small JavaScript loader (see
//! [`crate::bundle`]). This module implements the same protocol natively so
//! it can be embedded in Rust hosts and exercised directly:
//!
//! - a module runs the first time it is required, in a fresh [`Frame`]
//! - later requires get the cached [`Exports`] container, never a re-run
//! - requiring a module that is still executing (an import cycle) returns its
//!   exports as they are at that moment
//! - a module whose code fails stays failed: requiring it again raises the
//!   same error without running it twice

mod cache;
mod loader;

pub use cache::{CachedModule, Exports, ExportsCache};
pub use loader::{Evaluate, Frame, Loader, ModuleState, RuntimeError};
