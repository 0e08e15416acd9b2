use super::{BuildOptions, COMPILE_COMMANDS_FILE, load_register, run_build};
use crate::register::Register;
use anyhow::{Context, Result};
use colored::*;
use notify::{Config, Event, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;

/// Paths a build writes; changes to them must not trigger another build.
fn build_outputs(register: &Register) -> Vec<PathBuf> {
    let settings = &register.settings;
    let mut outputs = vec![
        settings.build_dir.clone(),
        settings.root.join(COMPILE_COMMANDS_FILE),
    ];
    outputs.extend(register.static_libraries.iter().map(|l| l.archive_path()));
    outputs.extend(register.executables.iter().map(|e| e.output_path()));
    outputs.extend(
        register
            .precompiled_headers
            .iter()
            .map(|h| settings.toolchain.family.pch_output(h.source.path())),
    );
    outputs
}

fn is_relevant(event: &Event, ignored: &[PathBuf]) -> bool {
    if event.kind.is_access() {
        return false;
    }
    event.paths.iter().any(|path| {
        !ignored.iter().any(|out| path.starts_with(out))
            && !path.components().any(|c| c.as_os_str() == ".git")
    })
}

/// Rebuild every time a project file changes.
pub fn watch(config_path: &Path, options: &BuildOptions) -> Result<()> {
    let register = load_register(config_path)?;
    let root = register.settings.root.clone();
    let mut ignored = build_outputs(&register);

    println!("{} Watching {} for changes...", "👀".cyan(), root.display());

    let (tx, rx) = channel();
    let notify_config = Config::default().with_poll_interval(Duration::from_secs(1));
    let mut watcher = notify::RecommendedWatcher::new(tx, notify_config)?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    rebuild(config_path, options, &mut ignored);

    while let Ok(event) = rx.recv() {
        let mut relevant = matches!(&event, Ok(e) if is_relevant(e, &ignored));
        // Debounce bursts from editors writing several files at once
        std::thread::sleep(Duration::from_millis(100));
        while let Ok(event) = rx.try_recv() {
            relevant |= matches!(&event, Ok(e) if is_relevant(e, &ignored));
        }
        if relevant {
            print!("\x1B[2J\x1B[1;1H");
            println!("{} File changed. Rebuilding...", "🔄".yellow());
            rebuild(config_path, options, &mut ignored);
        }
    }
    Ok(())
}

fn rebuild(config_path: &Path, options: &BuildOptions, ignored: &mut Vec<PathBuf>) {
    // The project file itself may have changed, so outputs are recomputed.
    if let Ok(register) = load_register(config_path) {
        *ignored = build_outputs(&register);
    }
    if let Err(e) = run_build(config_path, options) {
        println!("{} Error: {}", "x".red(), e);
    }
}
