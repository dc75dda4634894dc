//! End-to-end dispatch scenarios against a real OpenCL device.
//!
//! Like the hardware tests this crate's OpenCL bindings carry, these are
//! `#[ignore]`d by default: they need an actual OpenCL platform and
//! device available in the CI/dev environment, which is not guaranteed.
//! Run them explicitly with `cargo test -- --ignored` on a machine with
//! a working OpenCL ICD installed.

use std::fs;
use std::path::PathBuf;

use opencog_opencl::{DispatchResult, Engine, EngineConfig, InputArgument, Invocation, KernelIdentifier};

const VEC_MULT_SOURCE: &str = r#"
kernel void vec_mult(const float* a, const float* b, float* out, int n) {
    int i = get_global_id(0);
    if (i < n) {
        out[i] = a[i] * b[i];
    }
}
"#;

const VEC_ADD_SOURCE: &str = r#"
kernel void vec_mult(const float* a, const float* b, float* out, int n) {
    int i = get_global_id(0);
    if (i < n) {
        out[i] = a[i] * b[i];
    }
}

kernel void vec_add(const float* a, const float* b, float* out, int n) {
    int i = get_global_id(0);
    if (i < n) {
        out[i] = a[i] + b[i];
    }
}
"#;

/// Writes `source` to a fresh temp file and returns the `gpu://` locator
/// URL pointing at it, matching any platform and any device.
fn write_source_locator(name: &str, source: &str) -> (PathBuf, String) {
    let path = std::env::temp_dir().join(format!("opencog-opencl-test-{name}.cl"));
    fs::write(&path, source).expect("failed to write test kernel source");
    let url = format!("gpu://:/{}", path.display());
    (path, url)
}

fn test_config(cache_dir_name: &str) -> EngineConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    EngineConfig {
        cache_root: Some(std::env::temp_dir().join(cache_dir_name)),
        ..EngineConfig::default()
    }
}

fn read_result(engine: &Engine) -> Vec<f64> {
    match engine.read().expect("engine closed before producing a result") {
        DispatchResult::Value(buffer) => buffer.values().to_vec(),
        DispatchResult::Error(e) => panic!("dispatch failed: {}", e.message),
    }
}

#[test]
#[ignore]
fn vector_multiply() {
    let (path, url) = write_source_locator("vec-mult", VEC_MULT_SOURCE);
    let mut engine = Engine::new(test_config("opencog-opencl-test-cache-vecmult"));
    engine.open(&url).expect("engine open failed");

    engine
        .write_one(Invocation {
            kernel: KernelIdentifier::Name("vec_mult".to_string()),
            arguments: vec![
                InputArgument::Vector(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
                InputArgument::Vector(vec![2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 3.0, 42.0, 999.0]),
            ],
        })
        .expect("submit failed");

    assert_eq!(read_result(&engine), vec![2.0, 4.0, 6.0, 8.0, 10.0]);

    engine.close().expect("close failed");
    let _ = fs::remove_file(&path);
}

#[test]
#[ignore]
fn explicit_length_marker_is_accepted_ahead_of_the_vectors_it_bounds() {
    let (path, url) = write_source_locator("vec-mult-leading-length", VEC_MULT_SOURCE);
    let mut engine = Engine::new(test_config("opencog-opencl-test-cache-leading-length"));
    engine.open(&url).expect("engine open failed");

    // The length marker sits before the vector arguments it governs
    // rather than trailing them; normalization must still bind it to the
    // kernel's scalar slot instead of mistaking it for the first `Input`.
    engine
        .write_one(Invocation {
            kernel: KernelIdentifier::Name("vec_mult".to_string()),
            arguments: vec![
                InputArgument::Length(3),
                InputArgument::Vector(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
                InputArgument::Vector(vec![2.0, 2.0, 2.0, 2.0, 2.0]),
            ],
        })
        .expect("submit failed");

    assert_eq!(read_result(&engine), vec![2.0, 4.0, 6.0]);

    engine.close().expect("close failed");
    let _ = fs::remove_file(&path);
}

#[test]
#[ignore]
fn vector_add_reuses_open_engine() {
    let (path, url) = write_source_locator("vec-add", VEC_ADD_SOURCE);
    let mut engine = Engine::new(test_config("opencog-opencl-test-cache-vecadd"));
    engine.open(&url).expect("engine open failed");

    let a: Vec<f64> = (1..=11).map(|n| n as f64).collect();
    let b = vec![2.0, 3.0, 4.0, 5.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0, 0.0];
    engine
        .write_one(Invocation {
            kernel: KernelIdentifier::Name("vec_add".to_string()),
            arguments: vec![InputArgument::Vector(a), InputArgument::Vector(b)],
        })
        .expect("submit failed");

    assert_eq!(
        read_result(&engine),
        vec![3.0, 5.0, 7.0, 9.0, 11.0, 11.0, 11.0, 11.0, 11.0, 11.0, 11.0]
    );

    engine.close().expect("close failed");
    let _ = fs::remove_file(&path);
}

#[test]
#[ignore]
fn accumulator_loop_feeds_output_back_as_input() {
    let (path, url) = write_source_locator("vec-add-accum", VEC_ADD_SOURCE);
    let mut engine = Engine::new(test_config("opencog-opencl-test-cache-accum"));
    engine.open(&url).expect("engine open failed");

    let samples: [[f64; 3]; 5] = [
        [1.0, 2.0, 3.0],
        [4.0, 1.0, 0.0],
        [2.0, 2.0, 2.0],
        [0.0, 5.0, 1.0],
        [3.0, 0.0, 4.0],
    ];
    let mut expected = [0.0f64; 5];

    let mut acc = InputArgument::Vector(vec![0.0; 5]);
    for sample in samples {
        for (i, value) in sample.iter().enumerate() {
            expected[i] += value;
        }
        let mut padded = sample.to_vec();
        padded.resize(5, 0.0);

        engine
            .write_one(Invocation {
                kernel: KernelIdentifier::Name("vec_add".to_string()),
                arguments: vec![acc, InputArgument::Vector(padded)],
            })
            .expect("submit failed");

        let output = match engine.read().expect("engine closed mid-loop") {
            DispatchResult::Value(buffer) => buffer,
            DispatchResult::Error(e) => panic!("dispatch failed: {}", e.message),
        };
        let values = output.values().to_vec();
        acc = InputArgument::Buffer(output);
        assert_eq!(values.len(), 5);
    }

    if let InputArgument::Buffer(final_acc) = &acc {
        assert_eq!(final_acc.values(), &expected[..]);
    }

    engine.close().expect("close failed");
    let _ = fs::remove_file(&path);
}

#[test]
#[ignore]
fn unknown_kernel_fails_before_any_gpu_work() {
    let (path, url) = write_source_locator("vec-mult-unknown", VEC_MULT_SOURCE);
    let mut engine = Engine::new(test_config("opencog-opencl-test-cache-unknown"));
    engine.open(&url).expect("engine open failed");

    let result = engine.write_one(Invocation {
        kernel: KernelIdentifier::Name("does_not_exist".to_string()),
        arguments: vec![InputArgument::Vector(vec![1.0, 2.0, 3.0])],
    });
    assert!(matches!(result, Err(opencog_opencl::Error::UnknownKernel(_))));

    engine.close().expect("close failed");
    let _ = fs::remove_file(&path);
}

#[test]
#[ignore]
fn reopening_on_the_same_device_and_source_reuses_the_binary_cache() {
    let (path, url) = write_source_locator("vec-mult-cache", VEC_MULT_SOURCE);
    let config = test_config("opencog-opencl-test-cache-reuse");

    let mut first = Engine::new(config.clone());
    first.open(&url).expect("first open failed");
    assert!(!first.program_was_cached(), "first open has nothing to cache yet");
    first.close().expect("close failed");

    // A second Engine against the same device and source should load the
    // binary this first open already compiled and cached, rather than
    // invoking the source compiler again.
    let mut second = Engine::new(config);
    second.open(&url).expect("second open failed");
    assert!(second.program_was_cached(), "second open should reuse the binary cache");

    second
        .write_one(Invocation {
            kernel: KernelIdentifier::Name("vec_mult".to_string()),
            arguments: vec![
                InputArgument::Vector(vec![1.0, 2.0, 3.0]),
                InputArgument::Vector(vec![2.0, 2.0, 2.0]),
            ],
        })
        .expect("submit failed");
    assert_eq!(read_result(&second), vec![2.0, 4.0, 6.0]);

    second.close().expect("close failed");
    let _ = fs::remove_file(&path);
}

/// Requires a pre-compiled `.spv` binary for the target device at
/// `$TMPDIR/opencog-opencl-test-identity.spv`, built out of band for
/// whatever device this test runs against. Not provided by this
/// repository: OpenCL binaries are device- and driver-specific, so there
/// is no portable fixture to check in.
#[test]
#[ignore]
fn binary_program_dispatches_without_a_source_compile() {
    let path = std::env::temp_dir().join("opencog-opencl-test-identity.spv");
    if !path.exists() {
        eprintln!("skipping: {} not present", path.display());
        return;
    }
    let url = format!("gpu://:/{}", path.display());
    let mut engine = Engine::new(test_config("opencog-opencl-test-cache-binary"));
    engine.open(&url).expect("engine open failed");

    engine
        .write_one(Invocation {
            kernel: KernelIdentifier::Name("identity".to_string()),
            arguments: vec![InputArgument::Vector(vec![1.0, 2.0, 3.0])],
        })
        .expect("submit failed");
    assert_eq!(read_result(&engine), vec![1.0, 2.0, 3.0]);

    engine.close().expect("close failed");
}
