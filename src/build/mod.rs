mod clean;
mod compile_commands;
mod core;
mod feedback;
mod watcher;

pub use clean::clean;
pub use compile_commands::{COMPILE_COMMANDS_FILE, compile_database, write_compile_commands};
pub use core::{BuildPlan, BuildReport, build, plan, run_build};
pub use feedback::FeedbackAnalyzer;
pub use watcher::watch;

use crate::config::load_config;
use crate::register::Register;
use crate::scheduler::Concurrency;
use anyhow::{Context, Result};
use std::path::Path;

/// Knobs of one `buildit build` invocation.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub force: bool,
    pub release: bool,
    pub concurrency: Concurrency,
    pub progress: bool,
    /// Print the planned commands instead of running them.
    pub dry_run: bool,
}

/// Load the project file at `config_path` and freeze it into a register.
///
/// The project root is the directory holding the file, made absolute so
/// every generated path is valid whatever the caller's working directory.
pub fn load_register(config_path: &Path) -> Result<Register> {
    let config = load_config(config_path)?;
    let parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let root = std::path::absolute(parent)
        .with_context(|| format!("Failed to resolve project root {}", parent.display()))?;
    let register = Register::from_config(&config, &root)?;
    Ok(register)
}
