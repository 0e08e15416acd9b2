//! Build artifact cleanup.
//!
//! This module provides the `buildit clean` command. It removes everything a
//! build produces:
//!
//! - the build directory (objects and the ledger)
//! - static library archives, and their output directory once empty
//! - compiled precompiled headers (`.gch` / `.pch`)
//! - linked executables
//! - `compile_commands.json`

use super::compile_commands::COMPILE_COMMANDS_FILE;
use crate::register::Register;
use crate::toolchain::ToolchainFamily;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

fn remove_file(path: &Path) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    tracing::info!("removed {}", path.display());
    Ok(true)
}

/// Remove every build artifact of `register`. Returns the number of entries
/// deleted.
pub fn clean(register: &Register) -> Result<usize> {
    let settings = &register.settings;
    let mut removed = 0;

    if settings.build_dir.exists() {
        fs::remove_dir_all(&settings.build_dir).with_context(|| {
            format!(
                "Failed to remove build directory {}",
                settings.build_dir.display()
            )
        })?;
        removed += 1;
    }

    for library in &register.static_libraries {
        if remove_file(&library.archive_path())? {
            removed += 1;
        }
        // Only drop the output directory when nothing else lives there.
        if library.output_dir != settings.root
            && fs::read_dir(&library.output_dir).is_ok_and(|mut d| d.next().is_none())
        {
            fs::remove_dir(&library.output_dir).with_context(|| {
                format!("Failed to remove {}", library.output_dir.display())
            })?;
        }
    }

    // Outputs of either family, so switching toolchains leaves nothing behind.
    for header in &register.precompiled_headers {
        for family in [ToolchainFamily::Gnu, ToolchainFamily::Clang] {
            if remove_file(&family.pch_output(header.source.path()))? {
                removed += 1;
            }
        }
    }

    for exe in &register.executables {
        if remove_file(&exe.output_path())? {
            removed += 1;
        }
    }

    if remove_file(&settings.root.join(COMPILE_COMMANDS_FILE))? {
        removed += 1;
    }

    if removed > 0 {
        println!("{} Clean complete ({} removed).", "✓".green(), removed);
    } else {
        println!("{} Nothing to clean", "!".yellow());
    }
    Ok(removed)
}
