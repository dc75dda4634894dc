// Copyright (c) 2026 OpenCog Contributors. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Engine-wide configuration.
//!
//! Exactly one behavior is configurable: whether compiled program
//! binaries are cached to disk. Everything else — device selection,
//! program kind — is carried entirely by the
//! [`crate::locator::DeviceLocator`] instead.

use std::path::PathBuf;

/// Configuration accepted by [`crate::engine::Engine::open`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether to consult and populate the on-disk binary cache. Defaults
    /// to `true`; the cache's on-disk format is not considered stable
    /// across releases (see [`crate::cache::CACHE_FORMAT_VERSION`]), so
    /// implementers embedding this bridge into a release pipeline that
    /// cannot tolerate a stale cache should disable it explicitly.
    pub cache_enabled: bool,
    /// Overrides the cache root directory. `None` resolves the
    /// conventional user cache directory, falling back to `/tmp` when it
    /// cannot be determined (see [`crate::cache::cache_root`]).
    pub cache_root: Option<PathBuf>,
    /// Capacity of the bounded submission channel between the caller
    /// thread and the dispatcher thread.
    pub submission_queue_capacity: usize,
    /// Capacity of the bounded result queue the caller drains via
    /// [`crate::engine::Engine::read`].
    pub result_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cache_enabled: true,
            cache_root: None,
            submission_queue_capacity: 16,
            result_queue_capacity: 16,
        }
    }
}
