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

//! The IDL generator: a deliberately lightweight lexical scan of kernel
//! source text that discovers each kernel's name and argument directions.
//!
//! This is not a C parser. It recognizes `kernel void <name> ( <params> )`
//! (accepting the `__kernel` spelling as well, since both are valid
//! OpenCL C) and classifies each comma-separated parameter by its type
//! text alone. Anything stranger — attributes, macros, multi-dimensional
//! array parameters — is silently skipped rather than rejected; a kernel
//! this scan cannot recognize simply does not appear in the resulting
//! interface map, and dispatching to it later fails with `UnknownKernel`.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// The role a kernel parameter plays, inferred from its type text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// A `const`-qualified pointer: data flows host → device.
    Input,
    /// A non-`const` pointer: data flows device → host.
    Output,
    /// Anything without a `*`: a plain scalar, used for the trailing
    /// length argument (see [`crate::job`]).
    Scalar,
}

/// One kernel's signature: its name and the ordered directions of its
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelInterface {
    pub name: String,
    pub directions: Vec<Direction>,
}

impl KernelInterface {
    pub fn arity(&self) -> usize {
        self.directions.len()
    }
}

/// Scans `source` and returns a [`KernelInterface`] for every kernel
/// declaration the lexical scan recognizes, in source order.
pub fn extract_interfaces(source: &str) -> Vec<KernelInterface> {
    let cleaned = strip_comments(source);
    let tokens = tokenize(&cleaned);

    let mut interfaces = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let is_kernel_keyword = tokens[i] == "kernel" || tokens[i] == "__kernel";
        if is_kernel_keyword && tokens.get(i + 1).map(String::as_str) == Some("void") {
            if let (Some(name), Some(open_paren)) = (tokens.get(i + 2), tokens.get(i + 3)) {
                if is_identifier(name) && open_paren == "(" {
                    let params_start = i + 4;
                    if let Some(close) = matching_paren(&tokens, params_start) {
                        let directions = parse_params(&tokens[params_start..close]);
                        interfaces.push(KernelInterface {
                            name: name.clone(),
                            directions,
                        });
                        i = close + 1;
                        continue;
                    }
                }
            }
        }
        i += 1;
    }
    interfaces
}

/// Convenience wrapper building a name-keyed map from [`extract_interfaces`].
pub fn extract_interface_map(source: &str) -> HashMap<String, KernelInterface> {
    extract_interfaces(source)
        .into_iter()
        .map(|iface| (iface.name.clone(), iface))
        .collect()
}

/// Finds the index of the `)` token matching the `(` implicitly opened
/// just before `params_start` (the token stream's `(` itself is not
/// included in `tokens[params_start..]`), accounting for nested parens.
fn matching_paren(tokens: &[String], params_start: usize) -> Option<usize> {
    let mut depth = 1i32;
    let mut j = params_start;
    while j < tokens.len() {
        match tokens[j].as_str() {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

/// Splits a parameter token list on top-level commas and classifies each
/// parameter's direction.
fn parse_params(tokens: &[String]) -> Vec<Direction> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut directions = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, tok) in tokens.iter().enumerate() {
        match tok.as_str() {
            "(" => depth += 1,
            ")" => depth -= 1,
            "," if depth == 0 => {
                directions.push(classify(&tokens[start..idx]));
                start = idx + 1;
            }
            _ => {}
        }
    }
    directions.push(classify(&tokens[start..]));
    directions
}

fn classify(param_tokens: &[String]) -> Direction {
    let has_pointer = param_tokens.iter().any(|t| t == "*");
    let has_const = param_tokens.iter().any(|t| t == "const");
    match (has_pointer, has_const) {
        (true, true) => Direction::Input,
        (true, false) => Direction::Output,
        (false, _) => Direction::Scalar,
    }
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strips `//` and `/* */` comments. Kernel source is effectively ASCII,
/// so this operates byte-wise rather than tracking UTF-8 boundaries.
fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

/// Splits into identifier/number runs plus the lone punctuation tokens
/// the scan cares about (`(`, `)`, `,`, `*`); everything else is
/// whitespace and is discarded.
fn tokenize(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in source.chars() {
        if c.is_alphanumeric() || c == '_' {
            current.push(c);
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if "(),*".contains(c) {
            tokens.push(c.to_string());
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Builds a [`KernelInterface`] from OpenCL's own kernel-argument
/// reflection (`clGetKernelArgInfo`), used when a program was loaded from
/// a pre-compiled binary and no source text is available for the lexical
/// scan. Requires the program to have been built with
/// `-cl-kernel-arg-info` (see [`crate::program_loader::load_binary_program`]).
pub fn reflect_interface(
    name: &str,
    kernel: &opencl3::kernel::Kernel,
) -> Result<KernelInterface> {
    use opencl3::kernel::{CL_KERNEL_ARG_ADDRESS_GLOBAL, CL_KERNEL_ARG_TYPE_CONST};

    let num_args = kernel.num_args();
    let mut directions = Vec::with_capacity(num_args as usize);
    for index in 0..num_args {
        let address = kernel
            .get_arg_address_qualifier(index)
            .map_err(Error::from)?;
        let direction = if address == CL_KERNEL_ARG_ADDRESS_GLOBAL {
            let type_qualifier = kernel.get_arg_type_qualifier(index).map_err(Error::from)?;
            if type_qualifier & CL_KERNEL_ARG_TYPE_CONST != 0 {
                Direction::Input
            } else {
                Direction::Output
            }
        } else {
            Direction::Scalar
        };
        directions.push(direction);
    }
    Ok(KernelInterface {
        name: name.to_string(),
        directions,
    })
}
