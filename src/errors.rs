//! Error taxonomy of the build engine.
//!
//! Configuration errors are raised before any process is spawned. Command
//! failures carry the failing command's message verbatim so the caller can
//! surface it unchanged.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// A `depends_on` entry names a library that was never declared.
    #[error("library `{library}` depends on unknown library `{missing}`")]
    UnknownDependency { library: String, missing: String },

    /// The static library graph is not a DAG.
    #[error("cycle detected in static library dependencies: {}", .members.join(", "))]
    DependencyCycle { members: Vec<String> },

    #[error("toolchain `{0}` is not supported (expected `gnu` or `clang`)")]
    UnsupportedToolchain(String),

    #[error("static library `{0}` is declared more than once")]
    DuplicateLibrary(String),

    /// A precompiled header or executable refers to an undeclared library.
    #[error("`{owner}` refers to unknown library `{name}`")]
    UnknownLibrary { owner: String, name: String },

    /// A declared source file does not exist on disk.
    #[error("file `{}` does not exist", .0.display())]
    MissingSource(PathBuf),

    /// A spawned compiler, archiver or linker exited unsuccessfully.
    #[error("{message}")]
    CommandFailed {
        message: String,
        command: Vec<String>,
        /// Captured stdout and stderr of the failing process.
        output: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// True for errors detected before the build phase starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BuildError::UnknownDependency { .. }
                | BuildError::DependencyCycle { .. }
                | BuildError::UnsupportedToolchain(_)
                | BuildError::DuplicateLibrary(_)
                | BuildError::UnknownLibrary { .. }
                | BuildError::Config(_)
        )
    }
}
