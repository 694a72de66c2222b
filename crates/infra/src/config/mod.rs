//! Configuration loading

pub mod loader;

pub use loader::{apply_env_overrides, load, load_from_file, find_config_path};
