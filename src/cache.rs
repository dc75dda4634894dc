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

//! Content-addressed on-disk cache of compiled program binaries.
//!
//! Cache operations never fail a program build: every I/O error here is
//! logged at `warn` and treated as a cache miss or a no-op store, so the
//! caller always falls back to (re)compiling from source.
//!
//! The on-disk format is a single version byte followed by the raw
//! driver-native binary. The version is not a stability promise across
//! releases of this crate; it exists so a future release can recognize
//! and discard a cache written by an incompatible version instead of
//! trying to hand a stale layout to the driver.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Bumped whenever the on-disk cache file layout changes incompatibly.
pub const CACHE_FORMAT_VERSION: u8 = 1;

/// Resolves `<user-cache-root>/opencog/opencl`, falling back to `/tmp`
/// when the conventional user cache directory cannot be determined (e.g.
/// `HOME` is unset), unless `override_root` names a directory explicitly.
pub fn cache_root(override_root: Option<&Path>) -> PathBuf {
    if let Some(root) = override_root {
        return root.to_path_buf();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("opencog")
        .join("opencl")
}

/// A hex-encoded FNV-1a 64-bit hash of `platform-name | device-name |
/// driver-version`. Collisions are self-correcting: a cache hit is always
/// revalidated by asking the driver to build a program from it, and an
/// incompatible binary is discarded in favor of recompiling (see
/// [`crate::program_loader`]).
pub fn device_fingerprint(platform_name: &str, device_name: &str, driver_version: &str) -> String {
    let mut combined =
        String::with_capacity(platform_name.len() + device_name.len() + driver_version.len() + 2);
    combined.push_str(platform_name);
    combined.push('|');
    combined.push_str(device_name);
    combined.push('|');
    combined.push_str(driver_version);
    format!("{:016x}", fnv1a64(combined.as_bytes()))
}

/// A hex-encoded FNV-1a 64-bit hash of the exact kernel source bytes.
pub fn source_fingerprint(source: &[u8]) -> String {
    format!("{:016x}", fnv1a64(source))
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A content-addressed cache of compiled program binaries, keyed by
/// `(device fingerprint, source fingerprint)`.
pub struct BinaryCache {
    root: PathBuf,
    enabled: bool,
}

impl BinaryCache {
    pub fn new(enabled: bool, root: PathBuf) -> Self {
        BinaryCache { enabled, root }
    }

    fn path(&self, device_fp: &str, source_fp: &str) -> PathBuf {
        self.root.join(device_fp).join(format!("{source_fp}.bin"))
    }

    /// Reads the cached binary for `(device_fp, source_fp)`, if the cache
    /// is enabled, the file exists, and its format version matches. Any
    /// other outcome (disabled, missing, stale version, I/O error) is a
    /// silent cache miss, logged at `warn` except for plain "not found".
    pub fn load(&self, device_fp: &str, source_fp: &str) -> Option<Vec<u8>> {
        if !self.enabled {
            return None;
        }
        let path = self.path(device_fp, source_fp);
        match fs::read(&path) {
            Ok(bytes) => match bytes.split_first() {
                Some((&CACHE_FORMAT_VERSION, rest)) => {
                    log::debug!("binary cache hit at {}", path.display());
                    Some(rest.to_vec())
                }
                _ => {
                    log::warn!(
                        "binary cache file {} has an incompatible format version, ignoring",
                        path.display()
                    );
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("binary cache read error at {}: {e}", path.display());
                None
            }
        }
    }

    /// Writes `binary` to the cache for `(device_fp, source_fp)`, creating
    /// the device directory (mode `0755`) if needed. Writes to a sibling
    /// temp file and renames over the final path so a concurrent reader
    /// never observes a partial file. Never fails the caller: all errors
    /// are logged at `warn` and swallowed.
    pub fn store(&self, device_fp: &str, source_fp: &str, binary: &[u8]) {
        if !self.enabled {
            return;
        }
        let dir = self.root.join(device_fp);
        if let Err(e) = fs::create_dir_all(&dir) {
            log::warn!("binary cache: could not create {}: {e}", dir.display());
            return;
        }
        set_dir_mode_0755(&dir);

        let final_path = dir.join(format!("{source_fp}.bin"));
        let tmp_path = dir.join(format!("{source_fp}.bin.tmp"));
        let mut payload = Vec::with_capacity(binary.len() + 1);
        payload.push(CACHE_FORMAT_VERSION);
        payload.extend_from_slice(binary);

        if let Err(e) = fs::write(&tmp_path, &payload) {
            log::warn!("binary cache: could not write {}: {e}", tmp_path.display());
            return;
        }
        if let Err(e) = fs::rename(&tmp_path, &final_path) {
            log::warn!(
                "binary cache: could not install {} from {}: {e}",
                final_path.display(),
                tmp_path.display()
            );
        } else {
            log::debug!("binary cache: stored {}", final_path.display());
        }
    }
}

#[cfg(unix)]
fn set_dir_mode_0755(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o755)) {
        log::warn!("binary cache: could not set mode on {}: {e}", dir.display());
    }
}

#[cfg(not(unix))]
fn set_dir_mode_0755(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = device_fingerprint("NVIDIA CUDA", "GeForce RTX 3080", "535.104.05");
        let b = device_fingerprint("NVIDIA CUDA", "GeForce RTX 3080", "535.104.05");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn fingerprint_distinguishes_inputs() {
        let a = device_fingerprint("NVIDIA", "RTX 3080", "1.0");
        let b = device_fingerprint("NVIDIA", "RTX 3090", "1.0");
        assert_ne!(a, b);
    }

    #[test]
    fn source_fingerprint_changes_with_bytes() {
        let a = source_fingerprint(b"kernel void k() {}");
        let b = source_fingerprint(b"kernel void k() { }");
        assert_ne!(a, b);
    }

    #[test]
    fn round_trip_through_disk() {
        let dir = std::env::temp_dir().join(format!(
            "opencog-opencl-cache-test-{:016x}",
            fnv1a64(format!("{:?}", std::time::SystemTime::now()).as_bytes())
        ));
        let cache = BinaryCache::new(true, dir.clone());
        assert!(cache.load("devfp", "srcfp").is_none());

        cache.store("devfp", "srcfp", b"pretend-spir-v-bytes");
        let loaded = cache.load("devfp", "srcfp").expect("cache should hit after store");
        assert_eq!(loaded, b"pretend-spir-v-bytes");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn disabled_cache_never_hits() {
        let dir = std::env::temp_dir().join("opencog-opencl-cache-test-disabled");
        let cache = BinaryCache::new(false, dir.clone());
        cache.store("devfp", "srcfp", b"bytes");
        assert!(cache.load("devfp", "srcfp").is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn stale_format_version_is_ignored() {
        let dir = std::env::temp_dir().join("opencog-opencl-cache-test-stale");
        let _ = fs::create_dir_all(dir.join("devfp"));
        fs::write(
            dir.join("devfp").join("srcfp.bin"),
            [CACHE_FORMAT_VERSION.wrapping_add(1), 1, 2, 3],
        )
        .unwrap();
        let cache = BinaryCache::new(true, dir.clone());
        assert!(cache.load("devfp", "srcfp").is_none());
        let _ = fs::remove_dir_all(&dir);
    }
}
