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

//! Builds an OpenCL [`Program`] from either kernel source (consulting and
//! filling the [`crate::cache::BinaryCache`] along the way) or a
//! pre-compiled binary.

use std::ffi::CString;
use std::fs;
use std::path::Path;

use opencl3::context::Context;
use opencl3::program::Program;
use opencl3::types::cl_device_id;

use crate::cache::BinaryCache;
use crate::error::{cl_error_text, Error, Result};

/// The result of loading a program: the built program plus whether it
/// came from the on-disk cache rather than a fresh compile. Exposed via
/// [`crate::engine::Engine::program_was_cached`] so a caller reopening
/// the same device and source can observe that the compile was skipped.
pub struct LoadedProgram {
    pub program: Program,
    pub from_cache: bool,
}

/// Reads `source`, consults `cache` for a binary keyed by
/// `(device_fp, source_fingerprint(source))`, and either loads that
/// binary or compiles from source — storing a freshly compiled binary
/// back into the cache on success. Compiles with no special build flags.
pub fn build_from_source(
    context: &Context,
    device_id: cl_device_id,
    source: &str,
    cache: &BinaryCache,
    device_fp: &str,
) -> Result<LoadedProgram> {
    let source_fp = crate::cache::source_fingerprint(source.as_bytes());

    if let Some(cached) = cache.load(device_fp, &source_fp) {
        match try_build_from_binary(context, device_id, &cached, "") {
            Ok(program) => {
                log::debug!("loaded cached binary for device {device_fp} source {source_fp}");
                return Ok(LoadedProgram {
                    program,
                    from_cache: true,
                });
            }
            Err(e) => {
                log::warn!(
                    "cached binary for device {device_fp} source {source_fp} is invalid, recompiling from source: {e}"
                );
            }
        }
    }

    let csource = CString::new(source).map_err(|_| Error::ProgramBuildError {
        log: "kernel source contains an interior NUL byte".to_string(),
    })?;
    let program = Program::create_from_source(context.get(), &csource).map_err(|code| {
        Error::ProgramBuildError {
            log: cl_error_text(code),
        }
    })?;
    let no_options = CString::new("").expect("empty string has no interior NUL");
    if let Err(code) = program.build(&[device_id], &no_options) {
        let log = program
            .get_build_log(device_id)
            .map(|c| c.to_string_lossy().into_owned())
            .unwrap_or_else(|_| cl_error_text(code));
        return Err(Error::ProgramBuildError { log });
    }

    if let Ok(binaries) = program.get_binaries() {
        if let Some(binary) = binaries.into_iter().next() {
            cache.store(device_fp, &source_fp, &binary);
        }
    }

    Ok(LoadedProgram {
        program,
        from_cache: false,
    })
}

/// Loads a pre-compiled (e.g. SPIR-V) binary program from `path`. Built
/// with `-cl-kernel-arg-info` so [`crate::interface::reflect_interface`]
/// can recover a kernel signature in the absence of source text.
pub fn load_binary_program(context: &Context, device_id: cl_device_id, path: &Path) -> Result<Program> {
    let bytes = fs::read(path).map_err(|e| Error::BinaryLoadError(format!("{}: {e}", path.display())))?;
    try_build_from_binary(context, device_id, &bytes, "-cl-kernel-arg-info")
        .map_err(|e| Error::BinaryLoadError(e.to_string()))
}

fn try_build_from_binary(
    context: &Context,
    device_id: cl_device_id,
    binary: &[u8],
    options: &str,
) -> Result<Program> {
    let program = Program::create_from_binary(context.get(), &[device_id], &[binary]).map_err(Error::from)?;
    let options = CString::new(options).expect("build options have no interior NUL");
    program.build(&[device_id], &options).map_err(Error::from)?;
    Ok(program)
}
