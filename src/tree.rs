//! Artifact tree visualization.
//!
//! This module provides the `buildit list` command which displays the
//! declared artifacts in an ASCII tree: static libraries in the order they
//! are built, then every executable with its resolved link line.
//!
//! ## Example Output
//!
//! ```text
//! static libraries
//! ├── util
//! └── core (depends on: util)
//! executables
//! └── app (links: core util, system: m)
//! ```

use crate::errors::BuildError;
use crate::graph::DependencyGraph;
use crate::register::Register;
use colored::*;

fn branch(i: usize, count: usize) -> &'static str {
    if i + 1 == count { "└──" } else { "├──" }
}

/// Lines of the artifact tree, without colors.
pub fn render_tree(register: &Register) -> Result<Vec<String>, BuildError> {
    let graph = DependencyGraph::from_register(register)?;
    let order = graph.resolve_order()?;
    let mut lines = vec!["static libraries".to_string()];

    if order.is_empty() {
        lines.push("└── (none)".to_string());
    }
    for (i, &index) in order.iter().enumerate() {
        let library = &register.static_libraries[index];
        let mut line = format!("{} {}", branch(i, order.len()), library.name);
        if !library.depends_on.is_empty() {
            line.push_str(&format!(" (depends on: {})", library.depends_on.join(" ")));
        }
        lines.push(line);
    }

    lines.push("executables".to_string());
    if register.executables.is_empty() {
        lines.push("└── (none)".to_string());
    }
    for (i, exe) in register.executables.iter().enumerate() {
        let links: Vec<&str> = register
            .link_libraries(&graph, exe)?
            .into_iter()
            .map(|l| l.name.as_str())
            .collect();

        let mut details = Vec::new();
        if !links.is_empty() {
            details.push(format!("links: {}", links.join(" ")));
        }
        if !exe.system_libraries.is_empty() {
            details.push(format!("system: {}", exe.system_libraries.join(" ")));
        }
        let mut line = format!("{} {}", branch(i, register.executables.len()), exe.name);
        if !details.is_empty() {
            line.push_str(&format!(" ({})", details.join(", ")));
        }
        lines.push(line);
    }

    Ok(lines)
}

pub fn print_tree(register: &Register) -> Result<(), BuildError> {
    for line in render_tree(register)? {
        if line.starts_with('├') || line.starts_with('└') {
            println!("{}", line);
        } else {
            println!("{}", line.bold().cyan());
        }
    }
    Ok(())
}
