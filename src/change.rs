//! Staleness decisions for compile, archive and link steps.
//!
//! A file is rebuilt when any of three signals fires: its own modification
//! time moved, the command about to build it differs from the last one
//! recorded, or something it transitively `#include`s moved. Every decision
//! also stages the ledger entries that would make the same decision come out
//! "up to date" next time; those entries only reach disk after a successful
//! build.
//!
//! Include directives are parsed once per changed file, but they are
//! resolved again on every build against the search path of the artifact
//! being compiled. A directive that now lands on a different file makes the
//! including file stale, just like an edit would. Transitive staleness is
//! computed per strongly connected component of the include graph
//! (`petgraph`), so headers that include each other are walked once.

use crate::ledger::{BuildLedger, mtime_of};
use crate::source_file::SourceFile;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*(?:"([^"\n]+)"|<([^>\n]+)>)"#)
        .expect("include pattern is valid")
});

/// One `#include` directive as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeDirective {
    pub target: String,
    /// `"..."` form; angle includes skip the including file's directory.
    pub quoted: bool,
}

pub fn scan_directives(content: &str) -> Vec<IncludeDirective> {
    INCLUDE_RE
        .captures_iter(content)
        .filter_map(|cap| {
            if let Some(m) = cap.get(1) {
                Some(IncludeDirective {
                    target: m.as_str().trim().to_string(),
                    quoted: true,
                })
            } else {
                cap.get(2).map(|m| IncludeDirective {
                    target: m.as_str().trim().to_string(),
                    quoted: false,
                })
            }
        })
        .collect()
}

fn read_directives(path: &Path) -> Vec<IncludeDirective> {
    match fs::read(path) {
        Ok(bytes) => scan_directives(&String::from_utf8_lossy(&bytes)),
        Err(e) => {
            tracing::warn!("cannot scan {} for includes: {e}", path.display());
            Vec::new()
        }
    }
}

/// Lexically resolve `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Find the file an include directive refers to.
///
/// Targets starting with `./` or `../` are only looked up relative to the
/// including file. Otherwise quoted includes try the including file's
/// directory, then `artifact_dirs`, then `global_dirs`; angle includes skip
/// the first step. Unresolvable targets (system headers) yield `None`.
pub fn resolve_include(
    including: &Path,
    directive: &IncludeDirective,
    artifact_dirs: &[PathBuf],
    global_dirs: &[PathBuf],
) -> Option<PathBuf> {
    let own_dir = including.parent().unwrap_or_else(|| Path::new(""));
    let target = directive.target.as_str();

    if target.starts_with("./") || target.starts_with("../") {
        let candidate = normalize(&own_dir.join(target));
        return candidate.is_file().then_some(candidate);
    }

    let own = directive.quoted.then_some(own_dir);
    own.into_iter()
        .chain(artifact_dirs.iter().map(PathBuf::as_path))
        .chain(global_dirs.iter().map(PathBuf::as_path))
        .map(|dir| dir.join(target))
        .find(|candidate| candidate.is_file())
        .map(|candidate| normalize(&candidate))
}

/// Ledger key for an include search path.
fn search_key(artifact_dirs: &[PathBuf], global_dirs: &[PathBuf]) -> String {
    artifact_dirs
        .iter()
        .chain(global_dirs)
        .map(|d| d.to_string_lossy())
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ChangeDetector<'a> {
    ledger: &'a BuildLedger,
    force: bool,
    global_dirs: Vec<PathBuf>,
    /// Directives parsed ahead of time by [`ChangeDetector::prime`].
    primed: HashMap<PathBuf, Vec<IncludeDirective>>,
    /// Transitive staleness per search path and file, valid for this run only.
    memo: HashMap<String, HashMap<PathBuf, bool>>,
    pending: BuildLedger,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(ledger: &'a BuildLedger, global_dirs: &[PathBuf], force: bool) -> Self {
        Self {
            ledger,
            force,
            global_dirs: global_dirs.to_vec(),
            primed: HashMap::new(),
            memo: HashMap::new(),
            pending: BuildLedger::default(),
        }
    }

    fn modified(&self, path: &Path) -> bool {
        match mtime_of(path) {
            Some(now) => self.ledger.mtime(path) != Some(now),
            None => true,
        }
    }

    fn needs_parse(&self, path: &Path) -> bool {
        self.force || self.modified(path) || self.ledger.includes(path).is_none()
    }

    /// Parse the include directives of `files` in parallel.
    ///
    /// Only files whose persisted directives cannot be reused are read.
    /// The results are merged here, so the detector stays the only writer.
    pub fn prime<'p>(&mut self, files: impl IntoIterator<Item = &'p Path>) {
        let todo: Vec<&Path> = files
            .into_iter()
            .filter(|p| !self.primed.contains_key(*p) && self.needs_parse(p))
            .collect();
        if todo.is_empty() {
            return;
        }
        tracing::info!("scanning {} files for includes", todo.len());
        let parsed: Vec<(PathBuf, Vec<IncludeDirective>)> = todo
            .par_iter()
            .map(|p| (p.to_path_buf(), read_directives(p)))
            .collect();
        self.primed.extend(parsed);
    }

    /// Directives of `path`, reusing the persisted ones when it is unchanged.
    fn directives_of(&mut self, path: &Path, modified: bool) -> Vec<IncludeDirective> {
        if !self.force
            && !modified
            && let Some(known) = self.ledger.includes(path)
        {
            return known.to_vec();
        }

        let directives = match self.primed.remove(path) {
            Some(directives) => directives,
            None => read_directives(path),
        };
        self.pending.set_includes(path, directives.clone());
        directives
    }

    /// Direct staleness of `path` under one include search path, and the
    /// files it includes there.
    fn inspect(
        &mut self,
        path: &Path,
        artifact_dirs: &[PathBuf],
        search: &str,
    ) -> (bool, Vec<PathBuf>) {
        let modified = self.modified(path);
        if modified {
            tracing::info!("{} changed since the last build", path.display());
        }
        self.pending.record_mtime(path);

        let directives = self.directives_of(path, modified);
        let resolved: Vec<PathBuf> = directives
            .iter()
            .filter_map(|d| resolve_include(path, d, artifact_dirs, &self.global_dirs))
            .collect();
        let moved = self.ledger.resolved(search, path) != Some(resolved.as_slice());
        if moved && !modified {
            tracing::info!("includes of {} resolve to different files", path.display());
        }
        self.pending.set_resolved(search, path, resolved.clone());
        (modified || moved, resolved)
    }

    /// Settle the transitive staleness of `start` and of every file it
    /// reaches that has no answer in `memo` yet.
    ///
    /// Every file is inspected once. Files that include each other form one
    /// strongly connected component and share its answer.
    fn walk(
        &mut self,
        start: &Path,
        artifact_dirs: &[PathBuf],
        search: &str,
        memo: &mut HashMap<PathBuf, bool>,
    ) {
        let mut graph: DiGraph<PathBuf, ()> = DiGraph::new();
        let mut nodes: HashMap<PathBuf, NodeIndex> = HashMap::new();
        // own staleness, plus that of already settled includes
        let mut direct: Vec<bool> = Vec::new();

        let root = graph.add_node(start.to_path_buf());
        nodes.insert(start.to_path_buf(), root);
        direct.push(false);
        let mut todo = vec![root];

        while let Some(node) = todo.pop() {
            let path = graph[node].clone();
            let (mut stale, includes) = self.inspect(&path, artifact_dirs, search);
            for include in includes {
                if include == path {
                    continue;
                }
                if let Some(&known) = memo.get(&include) {
                    stale |= known;
                    continue;
                }
                let next = match nodes.get(&include) {
                    Some(&existing) => existing,
                    None => {
                        let added = graph.add_node(include.clone());
                        nodes.insert(include, added);
                        direct.push(false);
                        todo.push(added);
                        added
                    }
                };
                graph.update_edge(node, next, ());
            }
            direct[node.index()] = stale;
        }

        // Components come out after every component they include.
        for component in tarjan_scc(&graph) {
            let stale = component.iter().any(|&member| {
                direct[member.index()]
                    || graph
                        .neighbors(member)
                        .any(|n| memo.get(&graph[n]).copied().unwrap_or(false))
            });
            for member in component {
                memo.insert(graph[member].clone(), stale);
            }
        }
    }

    /// True when `path` or anything it transitively includes changed.
    ///
    /// `artifact_dirs` come before the global include directories when
    /// resolving includes.
    pub fn file_changed(&mut self, path: &Path, artifact_dirs: &[PathBuf]) -> bool {
        let search = search_key(artifact_dirs, &self.global_dirs);
        let mut memo = self.memo.remove(&search).unwrap_or_default();
        if !memo.contains_key(path) {
            self.walk(path, artifact_dirs, &search, &mut memo);
        }
        let stale = memo.get(path).copied().unwrap_or(true);
        self.memo.insert(search, memo);
        stale || self.force
    }

    /// Decide whether `source` must be recompiled into `object` with `argv`.
    ///
    /// The invocation is recorded against `object`, so a source built by
    /// several artifacts keeps one record per artifact. `implicit` lists
    /// extra inputs such as force-included headers. All inputs are visited
    /// even when an earlier signal already fired, so the staged ledger is
    /// complete.
    pub fn needs_rebuild(
        &mut self,
        source: &SourceFile,
        object: &Path,
        argv: &[String],
        artifact_dirs: &[PathBuf],
        implicit: &[&Path],
    ) -> bool {
        let mut stale = self.force;

        if !object.exists() {
            tracing::info!("{} has no object file yet", source);
            stale = true;
        }

        if self.ledger.invocation(object) != Some(argv) {
            tracing::info!("{} is built with a different command", source);
            stale = true;
        }
        self.pending.set_invocation(object, argv.to_vec());

        stale |= self.file_changed(source.path(), artifact_dirs);
        for watch in source.watches() {
            stale |= self.file_changed(watch.path(), artifact_dirs);
        }
        for input in implicit {
            stale |= self.file_changed(input, artifact_dirs);
        }

        if !stale {
            tracing::info!("{} is up to date", source);
        }
        stale
    }

    /// Check an archive or link output against the command that produces it.
    pub fn output_stale(&mut self, output: &Path, argv: &[String]) -> bool {
        let drifted = self.ledger.invocation(output) != Some(argv);
        self.pending.set_invocation(output, argv.to_vec());
        self.force || drifted || !output.exists()
    }

    /// True when the recorded command for `output` differs from `argv`.
    pub fn invocation_drifted(&self, output: &Path, argv: &[String]) -> bool {
        self.ledger.invocation(output).is_some_and(|known| known != argv)
    }

    /// Ledger entries staged by every decision made so far.
    pub fn into_pending(self) -> BuildLedger {
        self.pending
    }
}
