//! `compile_commands.json` generation for clangd and other tooling.

use super::core::{executable_commands, header_commands, library_commands};
use crate::register::Register;
use anyhow::{Context, Result};
use colored::*;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

pub const COMPILE_COMMANDS_FILE: &str = "compile_commands.json";

fn entry(root: &Path, argv: Vec<String>, file: &Path, output: &Path) -> Value {
    json!({
        "directory": root.to_string_lossy(),
        "arguments": argv,
        "file": file.to_string_lossy(),
        "output": output.to_string_lossy(),
    })
}

/// One entry per translation unit and precompiled header, using the exact
/// argument vectors a build would issue.
pub fn compile_database(register: &Register) -> Vec<Value> {
    let settings = &register.settings;
    let mut entries = Vec::new();

    for header in &register.precompiled_headers {
        let source = header.source.path();
        let output = settings.toolchain.family.pch_output(source);
        let argv = header_commands(register, header).precompile(source, &output);
        entries.push(entry(&settings.root, argv, source, &output));
    }

    for library in &register.static_libraries {
        let pair = library_commands(register, library);
        let object_dir = library.object_dir(&settings.build_dir);
        for source in &library.sources {
            let object = source.object_path(&object_dir);
            let argv = pair.compile(source.path(), &object);
            entries.push(entry(&settings.root, argv, source.path(), &object));
        }
    }

    for exe in &register.executables {
        let pair = executable_commands(register, exe);
        let object_dir = exe.object_dir(&settings.build_dir);
        for source in &exe.sources {
            let object = source.object_path(&object_dir);
            let argv = pair.compile(source.path(), &object);
            entries.push(entry(&settings.root, argv, source.path(), &object));
        }
    }

    entries
}

/// Write the compile database at the project root.
pub fn write_compile_commands(register: &Register) -> Result<PathBuf> {
    let entries = compile_database(register);
    let path = register.settings.root.join(COMPILE_COMMANDS_FILE);
    let json = serde_json::to_string_pretty(&entries)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    println!(
        "{} Wrote {} ({} entries)",
        "✓".green(),
        COMPILE_COMMANDS_FILE,
        entries.len()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::toolchain::{Toolchain, ToolchainFamily};

    #[test]
    fn test_database_mirrors_build_commands() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.c"), "").unwrap();
        fs::write(dir.path().join("main.cpp"), "").unwrap();
        let config = parse_config(
            r#"
[build]
defines = ["FOO"]

[[static_library]]
name = "core"
sources = ["a.c"]

[[executable]]
name = "app"
sources = ["main.cpp"]
"#,
        )
        .unwrap();
        let register =
            Register::with_toolchain(&config, dir.path(), Toolchain::new(ToolchainFamily::Gnu))
                .unwrap();

        let entries = compile_database(&register);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["arguments"][0], "gcc");
        assert_eq!(entries[1]["arguments"][0], "g++");
        let args: Vec<&str> = entries[0]["arguments"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(args.contains(&"-DFOO"));
        assert!(entries[0]["file"].as_str().unwrap().ends_with("a.c"));
    }
}
