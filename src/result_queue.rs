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

//! The bounded, closeable FIFO of [`DispatchResult`]s the dispatcher
//! thread produces and the caller drains via [`crate::engine::Engine::read`].
//!
//! `crossbeam-channel`'s bounded channel already has exactly the
//! semantics this queue needs: a full channel blocks the sender (here,
//! the dispatcher), an empty channel blocks the receiver (the caller), and
//! dropping the sender "closes" the channel — every value already queued
//! is still delivered, and once drained, further `recv()` calls return
//! immediately instead of blocking. `Engine::read` treats that as the
//! queue's terminator.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::buffer::DispatchResult;

pub(crate) fn channel(capacity: usize) -> (Sender<DispatchResult>, Receiver<DispatchResult>) {
    bounded(capacity)
}
