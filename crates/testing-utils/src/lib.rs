//! Shared helpers for tests across the workspace.

use std::{
    fs::create_dir_all,
    path::{absolute, PathBuf},
    str::FromStr as _,
};
use tempfile::TempDir;
use tracing::debug;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter, Registry,
};

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call from every
/// test; only the first call in a process installs anything.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    // a subscriber installed by an earlier test in this process is fine
    let _ = Registry::default()
        .with(filter)
        .with(fmt::layer().with_test_writer().with_line_number(true))
        .with(ErrorLayer::default())
        .try_init();
    let _ = color_eyre::install();
}

pub fn setup_tracing_and_temp_dir(name: Option<&str>, keep: bool) -> TempDir {
    setup_tracing();
    temporary_directory(name, keep)
}

/// Creates a temporary directory
pub fn temporary_directory(name: Option<&str>, keep: bool) -> TempDir {
    let abs_tmp_path = absolute(PathBuf::from_str("../../.tmp").unwrap()).unwrap();
    create_dir_all(&abs_tmp_path).unwrap();
    let builder = tempfile::Builder::new()
        .prefix(name.unwrap_or("evl-test-"))
        .rand_bytes(8)
        .keep(keep)
        .tempdir_in(abs_tmp_path);
    let temp_dir = builder.expect("Not able to create a temporary directory.");

    debug!("using random path: {:?} ", &temp_dir);
    temp_dir
}
