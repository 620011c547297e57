//! distrun-lib: build-and-release orchestration for CI pipelines
//!
//! Given a source checkout and a target name, this crate:
//! - detects the project's build system and drives it (`runners`)
//! - parses target names into cross-compilation intent (`target`, `platform`)
//! - runs the configure/task/collect/publish sequence (`pipeline`)
//! - decides from CI environment signals whether to upload artifacts, and
//!   uploads them (`publish`)

pub mod archive;
pub mod config;
pub mod context;
pub mod exec;
pub mod fs;
pub mod git;
pub mod pipeline;
pub mod placeholder;
pub mod platform;
pub mod publish;
pub mod runners;
pub mod target;
pub mod version;
