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

//! A GPU dispatch bridge for a symbolic hypergraph runtime.
//!
//! An [`Engine`] binds to a single OpenCL device named by a
//! [`DeviceLocator`] URL, builds (or loads) one program, and discovers
//! that program's kernel interfaces either by scanning its source
//! ([`interface::extract_interfaces`]) or, for pre-compiled binaries, by
//! asking the driver directly ([`interface::reflect_interface`]).
//!
//! Once open, the caller submits [`Invocation`]s through
//! [`Engine::write_one`]; a single dispatcher thread normalizes each one
//! into a job, runs it on the device, and delivers a [`DispatchResult`]
//! on the engine's result queue, which the caller drains with
//! [`Engine::read`]. Submission and result delivery are decoupled so a
//! caller can keep several dispatches in flight.
//!
//! Kernel arguments are float vectors wrapped in [`BufferValue`]; a
//! `BufferValue` lazily binds a device buffer the first time it is used
//! in a dispatch and keeps it for as long as the value is reused, so a
//! chain of dispatches that feeds one kernel's output into the next
//! kernel's input avoids a round trip through host memory in between.
//!
//! Compiled program binaries are cached on disk, keyed by a fingerprint
//! of the bound device and the exact kernel source, so repeated opens
//! against the same device and source recompile at most once.

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod buffer;
mod cache;
mod config;
mod device_binder;
mod engine;
mod error;
mod interface;
mod job;
mod locator;
mod program_loader;
mod result_queue;

pub use buffer::{BufferValue, DispatchResult, ErrorValue};
pub use config::EngineConfig;
pub use engine::{Engine, OpenState};
pub use error::{Error, Result};
pub use interface::{Direction, KernelInterface};
pub use job::{InputArgument, Invocation, KernelIdentifier};
pub use locator::{DeviceLocator, ProgramKind};
