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

//! Enumerates OpenCL platforms and devices and binds to the first one
//! matching a [`DeviceLocator`]'s selectors.
//!
//! Matching is a plain substring test against the platform/device name
//! strings the driver reports; an empty selector matches anything.
//! Platforms are tried in enumeration order, and within a matching
//! platform, devices of every type are tried in enumeration order, so
//! the first overall match wins.

use crate::error::{Error, Result};
use crate::locator::DeviceLocator;

use opencl3::device::{Device, CL_DEVICE_TYPE_ALL};
use opencl3::platform::get_platforms;
use opencl3::types::cl_device_id;

/// The device a [`crate::engine::Engine`] bound to, plus the identity
/// strings its [`crate::cache`] fingerprint is derived from.
pub struct BoundDevice {
    pub device_id: cl_device_id,
    pub platform_name: String,
    pub device_name: String,
    pub driver_version: String,
}

/// Enumerates platforms and devices, returning the first device whose
/// platform name contains `locator.platform_match` and whose own name
/// contains `locator.device_match`.
///
/// Fails with [`Error::NoMatchingDevice`] if no device matches, or if
/// querying the driver for platforms fails outright.
pub fn bind(locator: &DeviceLocator) -> Result<BoundDevice> {
    let no_match = || Error::NoMatchingDevice {
        platform: locator.platform_match.clone(),
        device: locator.device_match.clone(),
    };

    let platforms = get_platforms().map_err(|_| no_match())?;
    log::debug!(
        "enumerating {} OpenCL platform(s) for locator platform={:?} device={:?}",
        platforms.len(),
        locator.platform_match,
        locator.device_match
    );

    for platform in platforms {
        let platform_name = match platform.name() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                log::warn!("skipping platform: failed to query name: {e}");
                continue;
            }
        };
        if !platform_name.contains(&locator.platform_match) {
            continue;
        }

        let device_ids = match platform.get_devices(CL_DEVICE_TYPE_ALL) {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!("skipping platform {platform_name:?}: failed to enumerate devices: {e}");
                continue;
            }
        };

        for device_id in device_ids {
            let device = Device::new(device_id);
            let device_name = match device.name() {
                Ok(name) => name.to_string_lossy().into_owned(),
                Err(e) => {
                    log::warn!("skipping device on platform {platform_name:?}: failed to query name: {e}");
                    continue;
                }
            };
            if !device_name.contains(&locator.device_match) {
                continue;
            }

            let driver_version = device
                .driver_version()
                .map_err(|_| no_match())?
                .to_string_lossy()
                .into_owned();

            log::info!("bound OpenCL device {device_name:?} on platform {platform_name:?}");
            return Ok(BoundDevice {
                device_id,
                platform_name,
                device_name,
                driver_version,
            });
        }
    }

    Err(no_match())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::ProgramKind;

    fn locator(platform: &str, device: &str) -> DeviceLocator {
        DeviceLocator {
            platform_match: platform.to_string(),
            device_match: device.to_string(),
            program_path: "kernel.cl".to_string(),
            program_kind: ProgramKind::Source,
        }
    }

    // `bind` itself talks to the OpenCL driver, so it is only exercised by
    // the hardware-dependent tests under `tests/`. This covers the pure
    // construction of the failure the driver-facing tests rely on.
    #[test]
    fn no_matching_device_error_carries_selectors() {
        let err = Error::NoMatchingDevice {
            platform: "nvidia".to_string(),
            device: "rtx".to_string(),
        };
        assert!(err.to_string().contains("nvidia"));
        assert!(err.to_string().contains("rtx"));
    }

    #[test]
    fn wildcard_locator_has_empty_selectors() {
        let loc = locator("", "");
        assert_eq!(loc.platform_match, "");
        assert_eq!(loc.device_match, "");
    }
}
