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

//! Parses the `gpu://<platform>:<device>/<path>` device locator URL.
//!
//! This is a hand-written scan rather than a dependency on a general URL
//! crate: the scheme is fixed, the authority is a bare `platform:device`
//! pair rather than a host, and the only decision the result needs to carry
//! besides the three substrings is the program kind implied by the path's
//! extension.

use crate::error::Error;

/// Whether a [`DeviceLocator`]'s program path names OpenCL C source or a
/// pre-compiled (e.g. SPIR-V) binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    /// The path's final extension is `.spv`.
    Binary,
    /// Any other extension.
    Source,
}

/// A parsed `gpu://<platform>:<device>/<path>` locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLocator {
    /// Substring to match against platform names; empty means "any".
    pub platform_match: String,
    /// Substring to match against device names; empty means "any".
    pub device_match: String,
    /// The program file path, exactly as it appeared after the `/`.
    pub program_path: String,
    /// Source vs. pre-compiled binary, determined by `program_path`'s
    /// final extension.
    pub program_kind: ProgramKind,
}

const SCHEME: &str = "gpu://";

impl DeviceLocator {
    /// Parses `locator` as `gpu://<platform>:<device>/<path>`.
    ///
    /// `<platform>` and `<device>` may be empty. Fails with
    /// [`Error::MalformedLocator`] when the scheme prefix, the `:`
    /// separator, the `/` separator, or a final extension are absent.
    pub fn parse(locator: &str) -> Result<DeviceLocator, Error> {
        let malformed = |reason: &'static str| Error::MalformedLocator {
            locator: locator.to_string(),
            reason,
        };

        let rest = locator
            .strip_prefix(SCHEME)
            .ok_or_else(|| malformed("missing gpu:// scheme"))?;

        let slash = rest
            .find('/')
            .ok_or_else(|| malformed("missing / before program path"))?;
        let (authority, path_with_slash) = rest.split_at(slash);
        let program_path = &path_with_slash[1..];

        let colon = authority
            .find(':')
            .ok_or_else(|| malformed("missing : between platform and device"))?;
        let (platform_match, device_match) = authority.split_at(colon);
        let device_match = &device_match[1..];

        if program_path.is_empty() {
            return Err(malformed("empty program path"));
        }

        let program_kind = match program_path.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => {
                if ext.eq_ignore_ascii_case("spv") {
                    ProgramKind::Binary
                } else {
                    ProgramKind::Source
                }
            }
            _ => return Err(malformed("program path has no file extension")),
        };

        Ok(DeviceLocator {
            platform_match: platform_match.to_string(),
            device_match: device_match.to_string(),
            program_path: program_path.to_string(),
            program_kind,
        })
    }

    /// Re-serializes the locator back into `gpu://<platform>:<device>/<path>`.
    pub fn to_url(&self) -> String {
        format!(
            "{SCHEME}{}:{}/{}",
            self.platform_match, self.device_match, self.program_path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_locator() {
        let loc = DeviceLocator::parse("gpu://NVIDIA:RTX/kernels/vec_add.cl").unwrap();
        assert_eq!(loc.platform_match, "NVIDIA");
        assert_eq!(loc.device_match, "RTX");
        assert_eq!(loc.program_path, "kernels/vec_add.cl");
        assert_eq!(loc.program_kind, ProgramKind::Source);
    }

    #[test]
    fn empty_selectors_are_wildcards() {
        let loc = DeviceLocator::parse("gpu://:/kernel.cl").unwrap();
        assert_eq!(loc.platform_match, "");
        assert_eq!(loc.device_match, "");
    }

    #[test]
    fn spv_extension_is_binary() {
        let loc = DeviceLocator::parse("gpu://:/compiled/kernel.spv").unwrap();
        assert_eq!(loc.program_kind, ProgramKind::Binary);
    }

    #[test]
    fn non_spv_extension_is_source() {
        let loc = DeviceLocator::parse("gpu://:/compiled/kernel.cl").unwrap();
        assert_eq!(loc.program_kind, ProgramKind::Source);
    }

    #[test]
    fn round_trips_through_to_url() {
        let original = "gpu://Intel:GPU/path/to/kernel.cl";
        let loc = DeviceLocator::parse(original).unwrap();
        assert_eq!(loc.to_url(), original);
    }

    #[test]
    fn missing_scheme_is_malformed() {
        assert!(DeviceLocator::parse("http://a:b/c.cl").is_err());
    }

    #[test]
    fn missing_colon_is_malformed() {
        assert!(DeviceLocator::parse("gpu://nodevicepart/c.cl").is_err());
    }

    #[test]
    fn missing_slash_is_malformed() {
        assert!(DeviceLocator::parse("gpu://a:b").is_err());
    }

    #[test]
    fn missing_extension_is_malformed() {
        assert!(DeviceLocator::parse("gpu://a:b/path/kernel").is_err());
    }
}
