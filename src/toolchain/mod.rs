//! Toolchain selection and command construction
//!
//! Two compiler families are supported: GNU and Clang. The programs used for
//! each family come from the project file first, then from `CC`/`CXX`, then
//! from the family defaults.

pub mod commands;
pub mod types;

pub use commands::{CommandPair, LinkInputs, archive_command, build_commands, link_command};
pub use types::{Toolchain, ToolchainFamily};

use crate::config::ToolchainConfig;
use crate::errors::BuildError;

/// Resolve the toolchain declared in the project file.
pub fn resolve_toolchain(config: &ToolchainConfig) -> Result<Toolchain, BuildError> {
    resolve_with_env(config, |key| std::env::var(key).ok())
}

/// Like [`resolve_toolchain`] with an explicit environment lookup.
pub fn resolve_with_env(
    config: &ToolchainConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Toolchain, BuildError> {
    let family: ToolchainFamily = config.family.parse()?;
    let mut toolchain = Toolchain::new(family);

    if let Some(cc) = config.cc.clone().or_else(|| env("CC")) {
        toolchain.cc = cc;
    }
    if let Some(cxx) = config.cxx.clone().or_else(|| env("CXX")) {
        toolchain.cxx = cxx;
    }
    toolchain.linker = config
        .linker
        .clone()
        .unwrap_or_else(|| toolchain.cxx.clone());
    if let Some(ar) = config.archiver.clone().or_else(|| env("AR")) {
        toolchain.archiver = ar;
    }

    tracing::info!(
        "toolchain {}: cc={} cxx={} linker={} ar={}",
        toolchain.family,
        toolchain.cc,
        toolchain.cxx,
        toolchain.linker,
        toolchain.archiver
    );
    Ok(toolchain)
}
