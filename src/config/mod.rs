//! Configuration parsing and types.
//!
//! - `types` - [`CtlConfig`], the optional `brewctl.yaml`
//! - `parser` - locating and parsing the config file
//! - `env_file` - reading and editing the install's `.env` file
//! - `duration` - human-readable durations ("30s", "2m")

pub mod env_file;

mod duration;
mod parser;
mod types;

pub use duration::*;
pub use env_file::EnvFile;
pub use parser::*;
pub use types::*;
