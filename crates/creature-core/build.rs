/// Builds the gRPC client and server code for `creatures.proto` using
/// `tonic-prost-build`.
///
/// The Protocol Buffer definitions in the `proto` directory are compiled into
/// Rust modules with gRPC bindings in the crate's `OUT_DIR`. A file descriptor
/// set is written next to them so the server can expose gRPC reflection.
///
/// # Files and Paths
///
/// - Proto file: `proto/creatures.proto`
/// - Includes: `proto/`
/// - Descriptor set: `$OUT_DIR/creatures_descriptor.bin`
///
/// # Panics
///
/// Panics if `OUT_DIR` is unset or code generation fails.
///
/// # Output
///
/// Generated code is included from `src/lib.rs`:
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("server");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("creatures_descriptor.bin");

    println!("cargo:rerun-if-changed=proto/creatures.proto");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/creatures.proto"], &["proto"])
        .unwrap();
}
