//! Resolve a binary's transitive shared-library dependencies and stage them
//! into a self-contained deployment tree.
//!
//! Given a root executable or shared library, this crate discovers what it
//! links against, locates those libraries on disk, and copies the whole
//! closure into a destination directory that runs without system-installed
//! libraries.
//!
//! # Pipeline
//!
//! ```text
//! root binary
//!     │
//!     ├── format    header magic -> ELF / PE / Mach-O
//!     ├── tool      static registry picks ldd or objdump
//!     ├── parse     tool output -> dependency records (+ runpaths)
//!     ├── search    ordered search paths, versioned-name matching
//!     ├── graph     work queue + visited set, cycles terminate
//!     └── stage     atomic verified copies, runpath rewritten
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use depstage::{deploy, CancelToken, ResolveConfig, StageConfig};
//! use std::path::Path;
//!
//! let report = deploy(
//!     Path::new("target/release/mytool"),
//!     Path::new("dist/mytool"),
//!     &ResolveConfig::default(),
//!     &StageConfig::default(),
//!     &CancelToken::new(),
//! )?;
//! println!("{report}");
//! ```
//!
//! Per-dependency misses never abort a run: unresolved names are collected
//! with the exact directories searched and show up in the final report, as
//! do per-node errors and per-file copy outcomes.

pub mod cancel;
pub mod config;
pub mod error;
pub mod format;
pub mod graph;
pub mod parse;
pub mod process;
pub mod report;
pub mod search;
pub mod stage;
pub mod tool;

pub use cancel::CancelToken;
pub use config::{load_config, DeployConfig, ResolveConfig, StageConfig};
pub use error::{Error, Result};
pub use format::{detect_format, BinaryFormat, DetectedFormat};
pub use graph::{resolve_with_tools, DependencySource, Library, Resolution};
pub use report::{deploy, RunReport};
pub use search::{find_library, SearchOrder, SearchPathSet, UnresolvedDependency};
pub use stage::{build_plan, stage, CopyOutcome, CopyPlan, StageReport};
