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

//! [`BufferValue`]: a float vector paired with an optional device buffer.
//!
//! Composition, not inheritance: a `BufferValue` owns its host values
//! directly and, once bound, owns a device buffer plus a private read
//! queue through an embedded [`DeviceBinding`]. There is no shared base
//! class with the host-only float-vector value the surrounding
//! hypergraph runtime already has; capability is expressed instead
//! through the plain methods below.

use std::sync::Arc;

use opencl3::memory::{Buffer, CL_MEM_READ_WRITE};
use opencl3::types::{cl_mem, CL_BLOCKING};

use crate::engine::GpuHandles;
use crate::error::{Error, Result};

/// A device buffer, the engine it is bound to, and a queue private to
/// this value's downloads (so a `read()` is never blocked behind a
/// long-running kernel launch queued on the engine's shared queue).
pub(crate) struct DeviceBinding {
    pub(crate) engine: Arc<GpuHandles>,
    buffer: Buffer,
    read_queue: opencl3::command_queue::CommandQueue,
}

// `Buffer` and `CommandQueue` wrap raw OpenCL handles and are not marked
// `Send` upstream, but the OpenCL objects they wrap are safe to use from
// any single thread: a `BufferValue` is handed from the caller thread
// (where it is bound and uploaded) to the dispatcher thread (where its
// buffer is read back) and never touched concurrently by both.
unsafe impl Send for DeviceBinding {}

/// A float vector, optionally mirrored on a device.
pub struct BufferValue {
    values: Vec<f64>,
    binding: Option<DeviceBinding>,
    /// Set whenever `values` changes; cleared once a matching device
    /// write has actually been enqueued, so `upload` can skip buffers
    /// that are already current (e.g. a job's output fed back unchanged
    /// as the next job's input).
    dirty: bool,
}

impl BufferValue {
    pub fn new(values: Vec<f64>) -> Self {
        BufferValue {
            values,
            binding: None,
            dirty: true,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// The engine this value is bound to, if any.
    pub(crate) fn bound_engine(&self) -> Option<&Arc<GpuHandles>> {
        self.binding.as_ref().map(|b| &b.engine)
    }

    /// Pads with zeros or truncates the host vector to exactly `len`
    /// elements. Only meaningful before the first `bind` — an
    /// already-bound value's device buffer size is fixed.
    pub(crate) fn resize(&mut self, len: usize) {
        if self.values.len() != len {
            self.values.resize(len, 0.0);
            self.dirty = true;
        }
    }

    /// Allocates a read-write device buffer sized to the current vector
    /// length and a private read queue. A no-op if already bound.
    pub fn bind(&mut self, engine: Arc<GpuHandles>) -> Result<()> {
        if self.binding.is_some() {
            return Ok(());
        }
        // OpenCL forbids zero-byte buffers; a kernel invoked with only a
        // length marker still needs a (trivial) backing allocation for
        // any buffer arguments the signature names alongside it.
        let count = self.values.len().max(1);
        // Kernel parameters are declared `float*` (32-bit), not `double*`,
        // so the device buffer holds `f32` even though the host-side
        // vector stays a `f64` sequence; upload/download convert at the
        // boundary.
        let buffer = Buffer::create::<f32>(
            engine.context.get(),
            CL_MEM_READ_WRITE,
            count,
            std::ptr::null_mut(),
        )
        .map_err(Error::from)?;
        let read_queue =
            opencl3::command_queue::CommandQueue::create(engine.context.get(), engine.device_id, 0)
                .map_err(Error::from)?;
        self.binding = Some(DeviceBinding {
            engine,
            buffer,
            read_queue,
        });
        Ok(())
    }

    /// Blocking write of the host vector to the device buffer, on the
    /// engine's shared default queue (serialized against kernel
    /// launches). Skipped if the value is already current on the device.
    pub fn upload(&mut self) -> Result<()> {
        let binding = self.binding.as_ref().ok_or(Error::NotBound)?;
        if !self.dirty {
            return Ok(());
        }
        let narrowed: Vec<f32> = self.values.iter().map(|&v| v as f32).collect();
        binding
            .engine
            .default_queue
            .enqueue_write_buffer(binding.buffer.get(), CL_BLOCKING, 0, &narrowed, &[])
            .map_err(Error::from)?;
        self.dirty = false;
        Ok(())
    }

    /// Blocking read of the device buffer back into the host vector, on
    /// this value's private read queue. A no-op if unbound.
    pub fn download(&mut self) -> Result<()> {
        let Some(binding) = self.binding.as_ref() else {
            return Ok(());
        };
        let mut widened = vec![0.0f32; self.values.len().max(1)];
        binding
            .read_queue
            .enqueue_read_buffer(binding.buffer.get(), CL_BLOCKING, 0, &mut widened, &[])
            .map_err(Error::from)?;
        for (dst, &src) in self.values.iter_mut().zip(widened.iter()) {
            *dst = src as f64;
        }
        self.dirty = false;
        Ok(())
    }

    /// The device buffer handle, for binding into a kernel argument slot.
    pub fn as_argument(&self) -> Result<cl_mem> {
        Ok(self.binding.as_ref().ok_or(Error::NotBound)?.buffer.get())
    }
}

/// A sentinel the dispatcher substitutes for a job's output when the
/// OpenCL work itself failed: the result queue always produces
/// *something* for a submitted job, so a misbehaving job cannot starve a
/// caller blocked in `read`.
#[derive(Debug, Clone)]
pub struct ErrorValue {
    pub message: String,
}

/// An item placed on the engine's result queue: either the completed
/// output buffer, or an [`ErrorValue`] in its place.
pub enum DispatchResult {
    Value(BufferValue),
    Error(ErrorValue),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_value_is_unbound_and_dirty() {
        let b = BufferValue::new(vec![1.0, 2.0, 3.0]);
        assert!(!b.is_bound());
        assert_eq!(b.len(), 3);
        assert_eq!(b.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn resize_pads_with_zeros() {
        let mut b = BufferValue::new(vec![1.0, 2.0]);
        b.resize(4);
        assert_eq!(b.values(), &[1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn resize_truncates() {
        let mut b = BufferValue::new(vec![1.0, 2.0, 3.0, 4.0]);
        b.resize(2);
        assert_eq!(b.values(), &[1.0, 2.0]);
    }

    #[test]
    fn upload_before_bind_fails_not_bound() {
        let mut b = BufferValue::new(vec![1.0]);
        assert!(matches!(b.upload(), Err(Error::NotBound)));
    }

    #[test]
    fn download_before_bind_is_a_no_op() {
        let mut b = BufferValue::new(vec![1.0]);
        assert!(b.download().is_ok());
    }

    #[test]
    fn as_argument_before_bind_fails_not_bound() {
        let b = BufferValue::new(vec![1.0]);
        assert!(matches!(b.as_argument(), Err(Error::NotBound)));
    }
}
