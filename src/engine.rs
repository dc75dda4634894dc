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

//! The dispatch engine: binds a device, compiles or loads a program,
//! discovers its kernel interfaces, and runs a single dispatcher thread
//! that turns submitted [`Job`]s into OpenCL work.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use opencl3::context::Context;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::types::cl_device_id;

use crate::buffer::{DispatchResult, ErrorValue};
use crate::cache::{self, BinaryCache};
use crate::config::EngineConfig;
use crate::device_binder;
use crate::error::{Error, Result};
use crate::interface::{self, KernelInterface};
use crate::job::{self, Argument, InputArgument, Invocation, Job, KernelIdentifier};
use crate::locator::{DeviceLocator, ProgramKind};
use crate::{program_loader, result_queue};

/// The OpenCL objects an open `Engine` owns: context, default queue,
/// built program, and its kernels/interfaces. Lives behind an `Arc` so
/// both the caller thread (binding and uploading `BufferValue`s) and the
/// dispatcher thread (enqueuing kernel launches) can reach it.
pub(crate) struct GpuHandles {
    pub(crate) device_fingerprint: String,
    pub(crate) device_id: cl_device_id,
    pub(crate) context: Context,
    pub(crate) default_queue: opencl3::command_queue::CommandQueue,
    #[allow(dead_code)] // kept alive for as long as its kernels are used
    program: opencl3::program::Program,
    kernels: HashMap<String, Kernel>,
    pub(crate) interfaces: HashMap<String, KernelInterface>,
    /// Whether the program came from the on-disk binary cache rather
    /// than a fresh driver compile. Always `false` for a binary-kind
    /// locator, since that path never consults the compile cache.
    program_was_cached: bool,
}

// See `buffer::DeviceBinding`'s `Send` impl: these OpenCL objects are
// safe from any single thread, and this engine's own discipline (caller
// thread binds/uploads, dispatcher thread launches/reads) never touches
// them from two threads at once.
unsafe impl Send for GpuHandles {}
unsafe impl Sync for GpuHandles {}

/// `Engine`'s lifecycle: `unopened` → `open` → `closed`, monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenState {
    Unopened,
    Open,
    Closed,
}

/// The bound `(device, context, program, interfaces)` plus its
/// dispatcher and result queue. Created closed; `open` binds a device
/// and starts the dispatcher; `close` stops it and releases GPU
/// resources.
pub struct Engine {
    config: EngineConfig,
    state: OpenState,
    handles: Option<Arc<GpuHandles>>,
    submit_tx: Option<Sender<Job>>,
    dispatcher: Option<JoinHandle<()>>,
    results_rx: Option<Receiver<DispatchResult>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config,
            state: OpenState::Unopened,
            handles: None,
            submit_tx: None,
            dispatcher: None,
            results_rx: None,
        }
    }

    pub fn state(&self) -> OpenState {
        self.state
    }

    /// Parses `locator_url`, binds a device, builds/loads the program,
    /// populates the kernel interface map, and starts the dispatcher
    /// thread. A no-op if already open; fails with [`Error::NotConnected`]
    /// if called after `close`.
    pub fn open(&mut self, locator_url: &str) -> Result<()> {
        match self.state {
            OpenState::Open => return Ok(()),
            OpenState::Closed => return Err(Error::NotConnected),
            OpenState::Unopened => {}
        }

        let locator = DeviceLocator::parse(locator_url)?;
        let bound = device_binder::bind(&locator)?;

        let device_fingerprint = cache::device_fingerprint(
            &bound.platform_name,
            &bound.device_name,
            &bound.driver_version,
        );

        let device = opencl3::device::Device::new(bound.device_id);
        let context = Context::from_device(device).map_err(Error::from)?;
        let default_queue =
            opencl3::command_queue::CommandQueue::create(context.get(), bound.device_id, 0)
                .map_err(Error::from)?;

        let binary_cache = BinaryCache::new(
            self.config.cache_enabled,
            cache::cache_root(self.config.cache_root.as_deref()),
        );

        let (program, interfaces, program_was_cached) = match locator.program_kind {
            ProgramKind::Source => {
                let source = fs::read_to_string(&locator.program_path).map_err(|e| {
                    Error::ProgramBuildError {
                        log: format!("could not read {}: {e}", locator.program_path),
                    }
                })?;
                let loaded = program_loader::build_from_source(
                    &context,
                    bound.device_id,
                    &source,
                    &binary_cache,
                    &device_fingerprint,
                )?;
                log::info!(
                    "program built for {:?} ({})",
                    locator.program_path,
                    if loaded.from_cache {
                        "from cache"
                    } else {
                        "compiled from source"
                    }
                );
                let interfaces = interface::extract_interface_map(&source);
                (loaded.program, interfaces, loaded.from_cache)
            }
            ProgramKind::Binary => {
                let program = program_loader::load_binary_program(
                    &context,
                    bound.device_id,
                    locator.program_path.as_ref(),
                )?;
                let interfaces = HashMap::new(); // filled in below via reflection
                (program, interfaces, false)
            }
        };

        let kernel_handles = program.create_kernels_in_program().map_err(Error::from)?;
        let mut kernels = HashMap::with_capacity(kernel_handles.len());
        let mut interfaces = interfaces;
        for raw_kernel in kernel_handles {
            let kernel = Kernel::new(raw_kernel).map_err(Error::from)?;
            let name = kernel
                .function_name()
                .map_err(Error::from)?
                .to_string_lossy()
                .into_owned();
            if locator.program_kind == ProgramKind::Binary && !interfaces.contains_key(&name) {
                match interface::reflect_interface(&name, &kernel) {
                    Ok(iface) => {
                        interfaces.insert(name.clone(), iface);
                    }
                    Err(e) => {
                        log::warn!("could not reflect kernel arg info for {name:?}: {e}");
                    }
                }
            }
            kernels.insert(name, kernel);
        }

        let handles = Arc::new(GpuHandles {
            device_fingerprint,
            device_id: bound.device_id,
            context,
            default_queue,
            program,
            kernels,
            interfaces,
            program_was_cached,
        });

        let (submit_tx, submit_rx) = crossbeam_channel::bounded(self.config.submission_queue_capacity);
        let (results_tx, results_rx) = result_queue::channel(self.config.result_queue_capacity);

        let dispatcher_handles = Arc::clone(&handles);
        let dispatcher = thread::Builder::new()
            .name("opencog-opencl-dispatcher".to_string())
            .spawn(move || dispatch_loop(dispatcher_handles, submit_rx, results_tx))
            .expect("failed to spawn dispatcher thread");

        self.handles = Some(handles);
        self.submit_tx = Some(submit_tx);
        self.dispatcher = Some(dispatcher);
        self.results_rx = Some(results_rx);
        self.state = OpenState::Open;
        Ok(())
    }

    /// Normalizes and type-checks `invocation` against the kernel's
    /// interface, then enqueues the resulting [`Job`] for the dispatcher
    /// thread and returns immediately. Pre-submit failures (unknown
    /// kernel, arity/type mismatches, bad arguments) are surfaced here,
    /// synchronously; GPU-side failures are delivered later via `read`.
    pub fn write_one(&self, invocation: Invocation) -> Result<()> {
        if self.state != OpenState::Open {
            return Err(Error::NotConnected);
        }
        let handles = self.handles.as_ref().expect("handles present while open");
        let kernel_name = invocation.kernel.resolve()?;
        let job = job::normalize(handles, kernel_name, invocation.arguments)?;
        self.submit_tx
            .as_ref()
            .expect("channel present while open")
            .send(job)
            .map_err(|_| Error::NotConnected)
    }

    /// Blocks until a result is available or the engine is closed, in
    /// which case it returns `None` (the result queue's terminator).
    pub fn read(&self) -> Option<DispatchResult> {
        self.results_rx.as_ref()?.recv().ok()
    }

    /// Stops the dispatcher from accepting new jobs, waits for in-flight
    /// jobs to finish, and releases GPU resources. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state == OpenState::Closed {
            return Ok(());
        }
        // Dropping the sender lets the dispatcher's `for job in submit_rx`
        // loop end once it drains whatever was already queued.
        self.submit_tx.take();
        // Drop the receiver *before* joining the dispatcher, not after.
        // The result queue is bounded: if more jobs were queued than it
        // has capacity for and the caller never drained `read`, the
        // dispatcher can still be blocked inside `results_tx.send` for a
        // job further down the backlog. Dropping the receiver here
        // disconnects the channel, so that (and every subsequent) send
        // fails immediately instead of blocking, and the dispatcher's
        // loop reaches `break` and the thread exits. A caller blocked in
        // `read` also wakes immediately, since a recv on a disconnected
        // channel returns at once rather than waiting for `join`.
        self.results_rx.take();
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
        self.handles.take();
        self.state = OpenState::Closed;
        Ok(())
    }

    pub fn device_fingerprint(&self) -> Option<&str> {
        self.handles.as_ref().map(|h| h.device_fingerprint.as_str())
    }

    /// Whether the currently open program binary was served from the
    /// on-disk cache rather than freshly compiled. `false` while
    /// unopened or closed, and always `false` for a binary-kind locator.
    pub fn program_was_cached(&self) -> bool {
        self.handles
            .as_ref()
            .map(|h| h.program_was_cached)
            .unwrap_or(false)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// The dispatcher thread body: drains submitted jobs in FIFO order,
/// running each to completion before starting the next (submission
/// order is preserved; concurrent submission to one engine is a
/// non-goal), and pushes exactly one [`DispatchResult`] per job.
fn dispatch_loop(handles: Arc<GpuHandles>, submit_rx: Receiver<Job>, results_tx: Sender<DispatchResult>) {
    for job in submit_rx.iter() {
        let kernel_name = job.kernel_name.clone();
        let Some(kernel) = handles.kernels.get(&job.kernel_name) else {
            // write_one already checked the kernel exists; this would
            // mean the engine's own bookkeeping is broken.
            log::error!("dispatcher received a job for unregistered kernel {kernel_name:?}");
            continue;
        };
        let result = match run_job(&handles, kernel, job) {
            Ok(output) => DispatchResult::Value(output),
            Err(e) => {
                log::error!("dispatch of kernel {kernel_name:?} failed: {e}");
                DispatchResult::Error(ErrorValue {
                    message: e.to_string(),
                })
            }
        };
        if results_tx.send(result).is_err() {
            break; // the engine was closed and the result queue dropped
        }
    }
}

/// Executes one job's five steps — upload, bind arguments, launch,
/// wait, download the output — and returns its output buffer.
fn run_job(
    handles: &GpuHandles,
    kernel: &Kernel,
    mut job: Job,
) -> Result<crate::buffer::BufferValue> {
    for argument in job.arguments.iter_mut() {
        if let Argument::Buffer(buffer) = argument {
            buffer.upload()?;
        }
    }

    let mut execute = ExecuteKernel::new(kernel);
    for argument in job.arguments.iter() {
        match argument {
            Argument::Buffer(buffer) => {
                execute.set_arg(&buffer.as_argument()?);
            }
            Argument::Length(n) => {
                let n = *n as i32;
                execute.set_arg(&n);
            }
        }
    }
    // A zero-length dispatch (a kernel invoked with only a length
    // marker) still needs a valid, non-zero global work size.
    execute.set_global_work_size(job.length.max(1));
    let event = execute
        .enqueue_nd_range(&handles.default_queue, &[])
        .map_err(Error::from)?;
    opencl3::event::wait_for_events(&[event.get()]).map_err(Error::from)?;

    if let Argument::Buffer(buffer) = &mut job.arguments[job.output_index] {
        buffer.download()?;
    }

    match job.arguments.swap_remove(job.output_index) {
        Argument::Buffer(buffer) => Ok(buffer),
        Argument::Length(_) => unreachable!("output_index always names a buffer argument"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_engine_is_unopened() {
        let engine = Engine::new(EngineConfig::default());
        assert_eq!(engine.state(), OpenState::Unopened);
    }

    #[test]
    fn operations_on_unopened_engine_are_not_connected() {
        let engine = Engine::new(EngineConfig::default());
        let invocation = Invocation {
            kernel: KernelIdentifier::Name("vec_add".to_string()),
            arguments: vec![InputArgument::Vector(vec![1.0, 2.0])],
        };
        assert!(matches!(
            engine.write_one(invocation),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn close_before_open_is_a_harmless_no_op() {
        let mut engine = Engine::new(EngineConfig::default());
        assert!(engine.close().is_ok());
        assert_eq!(engine.state(), OpenState::Closed);
    }

    #[test]
    fn reopening_a_closed_engine_fails() {
        let mut engine = Engine::new(EngineConfig::default());
        engine.close().unwrap();
        assert!(matches!(
            engine.open("gpu://:/kernel.cl"),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn malformed_locator_surfaces_from_open() {
        let mut engine = Engine::new(EngineConfig::default());
        assert!(matches!(
            engine.open("not-a-gpu-url"),
            Err(Error::MalformedLocator { .. })
        ));
        // A failed open leaves the engine unopened, not open.
        assert_eq!(engine.state(), OpenState::Unopened);
    }
}
