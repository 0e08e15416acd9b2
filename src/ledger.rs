//! Persisted build ledger.
//!
//! Maps keyed by file path make rebuild decisions durable across runs: last
//! seen modification times, parsed `#include` directives, the files those
//! directives resolved to under each include search path, and the last
//! argument vector used to produce an output. The ledger is loaded once at the
//! start of a build and written back only after a fully successful run.

use crate::change::IncludeDirective;
use crate::errors::BuildError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tempfile::NamedTempFile;

pub const LEDGER_FILE: &str = "ledger.json";

/// Modification time of `path` in nanoseconds since the epoch.
pub fn mtime_of(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let since = modified.duration_since(UNIX_EPOCH).ok()?;
    u64::try_from(since.as_nanos()).ok()
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLedger {
    #[serde(default)]
    mtimes: BTreeMap<String, u64>,
    #[serde(default)]
    includes: BTreeMap<String, Vec<IncludeDirective>>,
    /// Search path key -> file -> resolved includes.
    #[serde(default)]
    resolved: BTreeMap<String, BTreeMap<String, Vec<PathBuf>>>,
    #[serde(default)]
    invocations: BTreeMap<String, Vec<String>>,
}

impl BuildLedger {
    /// Load the ledger stored in `build_dir`.
    ///
    /// A missing file yields an empty ledger. An unreadable or corrupt one is
    /// also treated as empty, which forces a full rebuild.
    pub fn load(build_dir: &Path) -> Self {
        let path = build_dir.join(LEDGER_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(ledger) => {
                tracing::info!("loaded build ledger from {}", path.display());
                ledger
            }
            Err(e) => {
                tracing::warn!("ignoring corrupt ledger {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Write the ledger into `build_dir`, replacing the previous file atomically.
    pub fn save(&self, build_dir: &Path) -> Result<(), BuildError> {
        fs::create_dir_all(build_dir)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BuildError::Config(format!("cannot serialize ledger: {e}")))?;

        let mut tmp = NamedTempFile::new_in(build_dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(build_dir.join(LEDGER_FILE))
            .map_err(|e| BuildError::Io(e.error))?;
        tracing::info!("saved build ledger to {}", build_dir.display());
        Ok(())
    }

    pub fn mtime(&self, path: &Path) -> Option<u64> {
        self.mtimes.get(&key(path)).copied()
    }

    /// Record the current modification time of `path`.
    pub fn record_mtime(&mut self, path: &Path) {
        match mtime_of(path) {
            Some(time) => {
                self.mtimes.insert(key(path), time);
            }
            None => {
                self.mtimes.remove(&key(path));
            }
        }
    }

    pub fn set_mtime(&mut self, path: &Path, time: u64) {
        self.mtimes.insert(key(path), time);
    }

    pub fn includes(&self, path: &Path) -> Option<&[IncludeDirective]> {
        self.includes.get(&key(path)).map(Vec::as_slice)
    }

    pub fn set_includes(&mut self, path: &Path, includes: Vec<IncludeDirective>) {
        self.includes.insert(key(path), includes);
    }

    /// Files the includes of `path` resolved to under `search`.
    pub fn resolved(&self, search: &str, path: &Path) -> Option<&[PathBuf]> {
        self.resolved
            .get(search)?
            .get(&key(path))
            .map(Vec::as_slice)
    }

    pub fn set_resolved(&mut self, search: &str, path: &Path, files: Vec<PathBuf>) {
        self.resolved
            .entry(search.to_string())
            .or_default()
            .insert(key(path), files);
    }

    pub fn invocation(&self, path: &Path) -> Option<&[String]> {
        self.invocations.get(&key(path)).map(Vec::as_slice)
    }

    pub fn set_invocation(&mut self, path: &Path, argv: Vec<String>) {
        self.invocations.insert(key(path), argv);
    }

    /// Fold entries confirmed by a successful run into this ledger.
    pub fn apply(&mut self, pending: BuildLedger) {
        self.mtimes.extend(pending.mtimes);
        self.includes.extend(pending.includes);
        for (search, files) in pending.resolved {
            self.resolved.entry(search).or_default().extend(files);
        }
        self.invocations.extend(pending.invocations);
    }

    pub fn is_empty(&self) -> bool {
        self.mtimes.is_empty()
            && self.includes.is_empty()
            && self.resolved.is_empty()
            && self.invocations.is_empty()
    }
}
