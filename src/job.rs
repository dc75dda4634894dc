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

//! The tagged argument variant at the dispatch boundary, length
//! determination, argument normalization, and the kernel signature check —
//! together these turn a heterogeneous [`Invocation`] into an immutable
//! [`Job`] ready for the dispatcher thread.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::BufferValue;
use crate::engine::GpuHandles;
use crate::error::{Error, Result};
use crate::interface::Direction;

/// How a dispatch names the kernel it wants run: either the name is
/// already known, or it is produced by executing a symbolic thunk the
/// surrounding hypergraph runtime supplies (its own "execute-on-demand"
/// evaluation discipline is out of scope here).
pub enum KernelIdentifier {
    Name(String),
    Resolve(Box<dyn FnOnce() -> std::result::Result<String, String> + Send>),
}

impl KernelIdentifier {
    pub(crate) fn resolve(self) -> Result<String> {
        match self {
            KernelIdentifier::Name(name) => Ok(name),
            KernelIdentifier::Resolve(thunk) => thunk().map_err(|reason| Error::BadArgument {
                index: 0,
                reason: format!("kernel identifier could not be resolved: {reason}"),
            }),
        }
    }
}

/// One raw element of a symbolic invocation, before normalization.
pub enum InputArgument {
    /// A host float vector (e.g. read from a symbolic vector node).
    Vector(Vec<f64>),
    /// A bare number value. Treated as a single-element vector, padded
    /// or truncated to the job's chosen length like any other vector.
    Number(f64),
    /// A [`BufferValue`] the caller already holds, possibly already
    /// bound to this (or another) engine from an earlier dispatch.
    Buffer(BufferValue),
    /// An explicit length marker: `N` is rounded to the nearest
    /// non-negative integer by the caller before wrapping it here. A
    /// negative value is ignored for length determination.
    Length(i64),
}

/// A symbolic kernel invocation as consumed by [`crate::engine::Engine::write_one`].
pub struct Invocation {
    pub kernel: KernelIdentifier,
    pub arguments: Vec<InputArgument>,
}

/// A normalized argument, bound to a fixed vector length N.
pub(crate) enum Argument {
    Buffer(BufferValue),
    /// The resolved length N, bound as a trailing (or positional)
    /// scalar kernel argument.
    Length(i64),
}

/// An immutable description of one dispatch, ready for the dispatcher
/// thread. Exists only for the duration of that one dispatch.
pub struct Job {
    pub(crate) kernel_name: String,
    pub(crate) length: usize,
    pub(crate) arguments: Vec<Argument>,
    pub(crate) output_index: usize,
}

/// Scans `arguments` once for an explicit, non-negative length marker;
/// falls back to the minimum size of all vector-like arguments.
fn determine_length(arguments: &[InputArgument]) -> (usize, bool) {
    for arg in arguments {
        if let InputArgument::Length(n) = arg {
            if *n >= 0 {
                return (*n as usize, true);
            }
        }
    }
    let min_vector_len = arguments
        .iter()
        .filter_map(|arg| match arg {
            InputArgument::Vector(v) => Some(v.len()),
            InputArgument::Buffer(b) => Some(b.len()),
            InputArgument::Number(_) | InputArgument::Length(_) => None,
        })
        .min()
        .unwrap_or(0);
    (min_vector_len, false)
}

/// Converts one caller-supplied [`InputArgument`] into a normalized
/// [`Argument`], binding any buffer to `engine` at length `length`.
/// `index` is the argument's position in the original invocation, used
/// only for error messages. Never called with [`InputArgument::Length`]:
/// [`normalize`] consumes length markers itself before reaching this.
fn normalize_one(
    engine: &Arc<GpuHandles>,
    index: usize,
    length: usize,
    input: InputArgument,
) -> Result<Argument> {
    let argument = match input {
        InputArgument::Buffer(mut buffer) => {
            if let Some(existing_engine) = buffer.bound_engine() {
                if !Arc::ptr_eq(existing_engine, engine) {
                    return Err(Error::BadArgument {
                        index,
                        reason: "buffer value is already bound to a different engine".into(),
                    });
                }
                if buffer.len() != length {
                    return Err(Error::BadArgument {
                        index,
                        reason: format!(
                            "buffer value has length {} but the job's chosen length is {length}",
                            buffer.len()
                        ),
                    });
                }
            } else {
                buffer.resize(length);
                buffer.bind(Arc::clone(engine))?;
            }
            Argument::Buffer(buffer)
        }
        InputArgument::Vector(values) => {
            let mut buffer = BufferValue::new(values);
            buffer.resize(length);
            buffer.bind(Arc::clone(engine))?;
            Argument::Buffer(buffer)
        }
        InputArgument::Number(value) => {
            let mut buffer = BufferValue::new(vec![value]);
            buffer.resize(length);
            buffer.bind(Arc::clone(engine))?;
            Argument::Buffer(buffer)
        }
        InputArgument::Length(_) => {
            unreachable!("normalize filters InputArgument::Length out before calling normalize_one")
        }
    };
    Ok(argument)
}

/// Normalizes `arguments` to length N, type-checks them against the
/// kernel's interface, and builds a [`Job`].
///
/// The caller's invocation lists the kernel's `Input` arguments in the
/// same left-to-right order the kernel declares them; an explicit length
/// marker may appear anywhere in that list (per §4.7/§6, "at any
/// position") and is not itself an `Input`/`Output` slot filler — it is
/// pulled out ahead of time and bound to every `Scalar` slot the kernel
/// declares. Any `Output`-direction slot the invocation does not supply
/// is filled here with a fresh, zero-initialized buffer of length N.
pub(crate) fn normalize(
    engine: &Arc<GpuHandles>,
    kernel_name: String,
    arguments: Vec<InputArgument>,
) -> Result<Job> {
    let interface = engine
        .interfaces
        .get(&kernel_name)
        .ok_or_else(|| Error::UnknownKernel(kernel_name.clone()))?;

    let (length, _length_present) = determine_length(&arguments);

    let mut supplied: VecDeque<Argument> = VecDeque::with_capacity(arguments.len());
    for (index, input) in arguments.into_iter().enumerate() {
        // The length marker is consumed by `determine_length` above and
        // bound directly to the interface's `Scalar` slot(s) below,
        // regardless of where it sat in the invocation; it never
        // occupies an `Input`/`Output` slot.
        if matches!(input, InputArgument::Length(_)) {
            continue;
        }
        supplied.push_back(normalize_one(engine, index, length, input)?);
    }

    let mut normalized = Vec::with_capacity(interface.arity());
    for direction in &interface.directions {
        match direction {
            Direction::Output => {
                let mut buffer = BufferValue::new(vec![0.0; length]);
                buffer.bind(Arc::clone(engine))?;
                normalized.push(Argument::Buffer(buffer));
            }
            Direction::Scalar => {
                normalized.push(Argument::Length(length as i64));
            }
            Direction::Input => {
                if let Some(argument) = supplied.pop_front() {
                    normalized.push(argument);
                }
            }
        }
    }

    // Leftover supplied arguments (more than the interface's `Input`/
    // `Scalar` slots could absorb) are counted into `actual` below so an
    // oversupplied invocation still fails `ArityMismatch` rather than
    // silently dropping arguments.
    let actual = normalized.len() + supplied.len();
    if actual != interface.arity() {
        return Err(Error::ArityMismatch {
            kernel: kernel_name,
            expected: interface.arity(),
            actual,
        });
    }

    for (index, (direction, argument)) in interface.directions.iter().zip(normalized.iter()).enumerate() {
        let matches = matches!(
            (direction, argument),
            (Direction::Input, Argument::Buffer(_))
                | (Direction::Output, Argument::Buffer(_))
                | (Direction::Scalar, Argument::Length(_))
        );
        if !matches {
            return Err(Error::ArgumentTypeMismatch {
                kernel: kernel_name,
                index,
            });
        }
    }

    let output_index = interface
        .directions
        .iter()
        .position(|d| matches!(d, Direction::Output))
        .or_else(|| {
            normalized
                .iter()
                .position(|a| matches!(a, Argument::Buffer(_)))
        })
        .ok_or_else(|| Error::BadArgument {
            index: 0,
            reason: "kernel has no buffer argument usable as an output".into(),
        })?;

    Ok(Job {
        kernel_name,
        length,
        arguments: normalized,
        output_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_length_wins_over_vector_sizes() {
        let args = vec![
            InputArgument::Vector(vec![1.0, 2.0, 3.0]),
            InputArgument::Length(5),
        ];
        let (length, present) = determine_length(&args);
        assert_eq!(length, 5);
        assert!(present);
    }

    #[test]
    fn negative_length_marker_is_ignored() {
        let args = vec![
            InputArgument::Vector(vec![1.0, 2.0, 3.0, 4.0]),
            InputArgument::Length(-1),
        ];
        let (length, present) = determine_length(&args);
        assert_eq!(length, 4);
        assert!(!present);
    }

    #[test]
    fn length_falls_back_to_minimum_vector_size() {
        let args = vec![
            InputArgument::Vector(vec![1.0; 5]),
            InputArgument::Vector(vec![1.0; 9]),
        ];
        let (length, present) = determine_length(&args);
        assert_eq!(length, 5);
        assert!(!present);
    }

    #[test]
    fn zero_vector_arguments_yield_zero_length() {
        let args = vec![InputArgument::Number(3.0)];
        // `Number` is not considered a vector for length purposes here:
        // it is normalized into a length-1 vector only once N is known.
        let (length, present) = determine_length(&args);
        assert_eq!(length, 0);
        assert!(!present);
    }
}
