//! Project file parsing (`buildit.toml`).
//!
//! This is the declarative surface end users edit. It is turned into a frozen
//! [`Register`](crate::register::Register) before the build starts.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "buildit.toml";

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default, rename = "precompiled_header")]
    pub precompiled_headers: Vec<PrecompiledHeaderConfig>,
    #[serde(default, rename = "static_library")]
    pub static_libraries: Vec<StaticLibraryConfig>,
    #[serde(default, rename = "executable")]
    pub executables: Vec<ExecutableConfig>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
    #[serde(default = "default_family")]
    pub family: String,
    pub cc: Option<String>,
    pub cxx: Option<String>,
    pub linker: Option<String>,
    pub archiver: Option<String>,
    #[serde(default = "default_standard")]
    pub c_standard: u32,
    #[serde(default = "default_standard")]
    pub cxx_standard: u32,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            family: default_family(),
            cc: None,
            cxx: None,
            linker: None,
            archiver: None,
            c_standard: default_standard(),
            cxx_standard: default_standard(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(default = "default_build_dir")]
    pub directory: PathBuf,
    #[serde(default)]
    pub release: bool,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub link_flags: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub include_directories: Vec<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            directory: default_build_dir(),
            release: false,
            flags: Vec::new(),
            link_flags: Vec::new(),
            defines: Vec::new(),
            include_directories: Vec::new(),
        }
    }
}

/// A `sources` entry: either a bare path or a path with watched files.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SourceEntry {
    Simple(PathBuf),
    Detailed {
        path: PathBuf,
        #[serde(default)]
        watches: Vec<PathBuf>,
    },
}

impl SourceEntry {
    pub fn path(&self) -> &Path {
        match self {
            SourceEntry::Simple(path) => path,
            SourceEntry::Detailed { path, .. } => path,
        }
    }

    pub fn watches(&self) -> &[PathBuf] {
        match self {
            SourceEntry::Simple(_) => &[],
            SourceEntry::Detailed { watches, .. } => watches,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct PrecompiledHeaderConfig {
    pub source: PathBuf,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    /// Attach the header to a single library instead of every artifact.
    pub library: Option<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct StaticLibraryConfig {
    pub name: String,
    #[serde(default = "default_library_dir")]
    pub output: PathBuf,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub include_directories: Vec<PathBuf>,
    #[serde(default)]
    pub force_cxx: bool,
    #[serde(default)]
    pub platforms: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExecutableConfig {
    pub name: String,
    #[serde(default = "default_exe_dir")]
    pub output: PathBuf,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub link_flags: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub include_directories: Vec<PathBuf>,
    #[serde(default)]
    pub library_directories: Vec<PathBuf>,
    #[serde(default)]
    pub system_libraries: Vec<String>,
    /// Static libraries to link. `None` links every declared library.
    pub depends_on: Option<Vec<String>>,
    #[serde(default)]
    pub force_cxx: bool,
    #[serde(default)]
    pub platforms: Vec<String>,
}

fn default_family() -> String {
    "gnu".to_string()
}

fn default_standard() -> u32 {
    17
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_library_dir() -> PathBuf {
    PathBuf::from("libraries")
}

fn default_exe_dir() -> PathBuf {
    PathBuf::from(".")
}

/// True when a declaration restricted to `platforms` applies on this host.
pub fn platform_matches(platforms: &[String]) -> bool {
    platforms.is_empty()
        || platforms
            .iter()
            .any(|p| p.eq_ignore_ascii_case(current_platform()))
}

pub fn current_platform() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "linux"
    }
}

pub fn parse_config(content: &str) -> Result<ProjectConfig> {
    toml::from_str(content).context(
        "Failed to parse buildit.toml - check for syntax errors (missing quotes, brackets)",
    )
}

pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "{} not found.\n\n\
            💡 Tip: declare your libraries and executables in a buildit.toml at the project root.",
            path.display()
        ));
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} - check file permissions", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[toolchain]
family = "clang"
cxx_standard = 20

[build]
release = true
defines = ["DEBUG", "_DEBUG=1"]
include_directories = ["include"]

[[precompiled_header]]
source = "include/pch.hpp"
library = "core"

[[static_library]]
name = "core"
sources = ["src/a.c", { path = "src/b.c", watches = ["gen/table.inc"] }]
depends_on = ["util"]

[[static_library]]
name = "util"
output = "out/libs"
sources = ["util/u.c"]

[[executable]]
name = "app"
sources = ["app/main.cpp"]
system_libraries = ["m"]
"#;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.toolchain.family, "clang");
        assert_eq!(config.toolchain.c_standard, 17);
        assert_eq!(config.toolchain.cxx_standard, 20);
        assert!(config.build.release);
        assert_eq!(config.build.directory, PathBuf::from("build"));
        assert_eq!(config.precompiled_headers[0].library.as_deref(), Some("core"));
        assert_eq!(config.static_libraries.len(), 2);
        assert_eq!(config.static_libraries[0].depends_on, vec!["util"]);
        assert_eq!(config.static_libraries[0].output, PathBuf::from("libraries"));
        assert_eq!(config.static_libraries[1].output, PathBuf::from("out/libs"));
        assert!(config.executables[0].depends_on.is_none());
    }

    #[test]
    fn test_source_entry_forms() {
        let config = parse_config(SAMPLE).unwrap();
        let sources = &config.static_libraries[0].sources;
        assert_eq!(sources[0].path(), Path::new("src/a.c"));
        assert!(sources[0].watches().is_empty());
        assert_eq!(sources[1].path(), Path::new("src/b.c"));
        assert_eq!(sources[1].watches(), &[PathBuf::from("gen/table.inc")]);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.toolchain.family, "gnu");
        assert!(!config.build.release);
        assert!(config.static_libraries.is_empty());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(parse_config("[build]\noptimize = true\n").is_err());
    }

    #[test]
    fn test_platform_filter() {
        assert!(platform_matches(&[]));
        assert!(platform_matches(&[current_platform().to_uppercase()]));
        assert!(!platform_matches(&["plan9".to_string()]));
    }
}
