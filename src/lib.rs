//! # buildit - Incremental C/C++ Build Engine
//!
//! buildit reads a declarative `buildit.toml` describing precompiled headers,
//! static libraries and executables, works out which compile, archive and
//! link steps are stale, and runs them as child processes under a bounded
//! job limit.
//!
//! ## Features
//!
//! - **Minimal Rebuilds**: modification times, transitive `#include`s and the
//!   exact compiler command all count as staleness signals
//! - **Dependency Graph**: static libraries are ordered topologically and
//!   linked dependents-first
//! - **Fail Fast**: the first failing command stops every sibling
//! - **Two Toolchains**: GCC and Clang, with precompiled header support
//!
//! ## Quick Start
//!
//! ```bash
//! # Build with four parallel jobs
//! buildit build -j 4
//!
//! # Generate compile_commands.json for clangd
//! buildit compile-commands
//! ```
//!
//! ## Module Organization
//!
//! - [`build`] - Pipeline orchestration, clean, watch
//! - [`change`] - Staleness decisions and include scanning
//! - [`scheduler`] - Process pool with barriers and progress
//! - [`toolchain`] - Compiler selection and command construction

/// Build pipeline, cleanup, compile database and watch mode.
pub mod build;

/// Change detection (`#include` scanning, invocation drift).
pub mod change;

/// Configuration file parsing (`buildit.toml`).
pub mod config;

/// Error taxonomy.
pub mod errors;

/// Static library dependency graph.
pub mod graph;

/// Persisted build ledger.
pub mod ledger;

/// Frozen set of declared artifacts.
pub mod register;

/// Command queue and process pool.
pub mod scheduler;

/// Declared source files.
pub mod source_file;

/// Toolchain selection and command construction.
pub mod toolchain;

/// Artifact tree visualization.
pub mod tree;
