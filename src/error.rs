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

//! The error taxonomy for the dispatch bridge.
//!
//! Pre-submit failures (locator parsing, device binding, program build,
//! signature checking) are returned synchronously to the caller;
//! `DeviceError` raised inside the dispatcher thread is instead
//! delivered out-of-band as an [`crate::buffer::ErrorValue`] on the result
//! queue so a misbehaving job cannot deadlock the dispatcher.

use opencl3::types::cl_int;

/// Errors raised while locating, binding, compiling for, or dispatching
/// work to an OpenCL device.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// The device locator URL did not match `gpu://<platform>:<device>/<path>`.
    #[error("malformed device locator {locator:?}: {reason}")]
    MalformedLocator { locator: String, reason: &'static str },

    /// No platform or device matched the locator's selectors.
    #[error("no OpenCL device matched platform={platform:?} device={device:?}")]
    NoMatchingDevice { platform: String, device: String },

    /// Building a program from source failed; `log` is the driver's build log.
    #[error("OpenCL program build failed:\n{log}")]
    ProgramBuildError { log: String },

    /// Constructing a program from a pre-compiled binary failed.
    #[error("OpenCL binary program could not be loaded: {0}")]
    BinaryLoadError(String),

    /// A submit call named a kernel absent from the program's interface map.
    #[error("unknown kernel {0:?}")]
    UnknownKernel(String),

    /// The invocation's argument count did not match the kernel's interface.
    #[error("kernel {kernel:?} expects {expected} arguments, got {actual}")]
    ArityMismatch {
        kernel: String,
        expected: usize,
        actual: usize,
    },

    /// An argument's kind did not match the kernel interface at `index`.
    #[error("argument {index} of kernel {kernel:?} has the wrong type")]
    ArgumentTypeMismatch { kernel: String, index: usize },

    /// An argument could not be normalized into a buffer, scalar, or kernel name.
    #[error("bad argument at position {index}: {reason}")]
    BadArgument { index: usize, reason: String },

    /// An operation that requires an open `Engine` was called while it was
    /// unopened or already closed.
    #[error("engine is not connected")]
    NotConnected,

    /// `BufferValue::upload`/`download` was called before `bind`.
    #[error("buffer value is not bound to an engine")]
    NotBound,

    /// Any OpenCL driver call failed at runtime.
    #[error("OpenCL device error: {0}")]
    DeviceError(String),
}

impl From<cl_int> for Error {
    fn from(code: cl_int) -> Self {
        Error::DeviceError(cl_error_text(code))
    }
}

/// Renders a raw OpenCL error code as a readable message, falling back to
/// the bare numeric code for values `opencl3` does not recognize.
pub(crate) fn cl_error_text(code: cl_int) -> String {
    let text = opencl3::error_codes::error_text(code);
    if text.is_empty() {
        format!("OpenCL error code {code}")
    } else {
        format!("{text} ({code})")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
