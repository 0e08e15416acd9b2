//! The frozen set of declared artifacts.
//!
//! A [`Register`] is built once from the project file during the
//! single-threaded configuration phase and then only read. It is passed by
//! reference to the orchestrator and the command builder.

use crate::config::{
    ExecutableConfig, PrecompiledHeaderConfig, ProjectConfig, SourceEntry, StaticLibraryConfig,
    platform_matches,
};
use crate::errors::BuildError;
use crate::graph::DependencyGraph;
use crate::source_file::{Language, SourceFile};
use crate::toolchain::{self, Toolchain};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A preprocessor definition, `NAME` or `NAME=VALUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub value: Option<String>,
}

impl Define {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((name, value)) => Self {
                name: name.trim().to_string(),
                value: Some(value.to_string()),
            },
            None => Self {
                name: raw.trim().to_string(),
                value: None,
            },
        }
    }

    pub fn to_flag(&self) -> String {
        match &self.value {
            Some(value) => format!("-D{}={}", self.name, value),
            None => format!("-D{}", self.name),
        }
    }
}

impl fmt::Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Global compiler settings shared by every artifact.
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub toolchain: Toolchain,
    pub c_standard: u32,
    pub cxx_standard: u32,
    pub release: bool,
    pub build_dir: PathBuf,
    pub build_flags: Vec<String>,
    pub link_flags: Vec<String>,
    pub defines: Vec<Define>,
    pub include_directories: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PreCompiledHeader {
    pub source: SourceFile,
    pub extra_build_flags: Vec<String>,
    pub extra_defines: Vec<Define>,
    /// Library this header is attached to; `None` applies it everywhere.
    pub library: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StaticLibrary {
    pub name: String,
    pub output_dir: PathBuf,
    pub sources: Vec<SourceFile>,
    pub extra_build_flags: Vec<String>,
    pub extra_defines: Vec<Define>,
    pub depends_on: Vec<String>,
    pub include_directories: Vec<PathBuf>,
    pub force_cxx: bool,
}

impl StaticLibrary {
    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(format!("lib{}.a", self.name))
    }

    /// Objects of this library live under `<build>/lib/<name>`, so a source
    /// shared with another artifact never shares its object.
    pub fn object_dir(&self, build_dir: &Path) -> PathBuf {
        build_dir.join("lib").join(&self.name)
    }

    pub fn objects(&self, build_dir: &Path) -> Vec<PathBuf> {
        let dir = self.object_dir(build_dir);
        self.sources.iter().map(|s| s.object_path(&dir)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Executable {
    pub name: String,
    pub output_dir: PathBuf,
    pub sources: Vec<SourceFile>,
    pub extra_build_flags: Vec<String>,
    pub extra_link_flags: Vec<String>,
    pub extra_defines: Vec<Define>,
    pub include_directories: Vec<PathBuf>,
    pub library_directories: Vec<PathBuf>,
    pub system_libraries: Vec<String>,
    /// `None` links every declared static library.
    pub depends_on: Option<Vec<String>>,
    pub force_cxx: bool,
}

impl Executable {
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.name)
    }

    pub fn object_dir(&self, build_dir: &Path) -> PathBuf {
        build_dir.join("exe").join(&self.name)
    }

    pub fn objects(&self, build_dir: &Path) -> Vec<PathBuf> {
        let dir = self.object_dir(build_dir);
        self.sources.iter().map(|s| s.object_path(&dir)).collect()
    }
}

/// Borrowed view over one declared artifact, as seen by the command builder.
#[derive(Debug, Clone, Copy)]
pub enum Artifact<'a> {
    Header(&'a PreCompiledHeader),
    Library(&'a StaticLibrary),
    Executable(&'a Executable),
}

impl<'a> Artifact<'a> {
    pub fn extra_build_flags(&self) -> &'a [String] {
        match self {
            Artifact::Header(h) => &h.extra_build_flags,
            Artifact::Library(l) => &l.extra_build_flags,
            Artifact::Executable(e) => &e.extra_build_flags,
        }
    }

    pub fn extra_defines(&self) -> &'a [Define] {
        match self {
            Artifact::Header(h) => &h.extra_defines,
            Artifact::Library(l) => &l.extra_defines,
            Artifact::Executable(e) => &e.extra_defines,
        }
    }

    pub fn include_directories(&self) -> &'a [PathBuf] {
        match self {
            Artifact::Header(_) => &[],
            Artifact::Library(l) => &l.include_directories,
            Artifact::Executable(e) => &e.include_directories,
        }
    }

    pub fn force_cxx(&self) -> bool {
        match self {
            Artifact::Header(_) => false,
            Artifact::Library(l) => l.force_cxx,
            Artifact::Executable(e) => e.force_cxx,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Register {
    pub settings: Settings,
    pub precompiled_headers: Vec<PreCompiledHeader>,
    pub static_libraries: Vec<StaticLibrary>,
    pub executables: Vec<Executable>,
}

impl Register {
    /// Validate `config` and freeze it into a register rooted at `root`.
    ///
    /// Fails on the first missing source file, duplicate library name,
    /// unsupported toolchain or header attached to an unknown library.
    pub fn from_config(config: &ProjectConfig, root: &Path) -> Result<Self, BuildError> {
        let toolchain = toolchain::resolve_toolchain(&config.toolchain)?;
        Self::with_toolchain(config, root, toolchain)
    }

    /// Like [`Register::from_config`] with an already resolved toolchain.
    pub fn with_toolchain(
        config: &ProjectConfig,
        root: &Path,
        toolchain: Toolchain,
    ) -> Result<Self, BuildError> {
        let settings = Settings {
            root: root.to_path_buf(),
            toolchain,
            c_standard: config.toolchain.c_standard,
            cxx_standard: config.toolchain.cxx_standard,
            release: config.build.release,
            build_dir: root.join(&config.build.directory),
            build_flags: config.build.flags.clone(),
            link_flags: config.build.link_flags.clone(),
            defines: merge_global_defines(&config.build.defines),
            include_directories: resolve_dirs(root, &config.build.include_directories),
        };

        let static_libraries = config
            .static_libraries
            .iter()
            .filter(|l| platform_matches(&l.platforms))
            .map(|l| library_from_config(l, root))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        for library in &static_libraries {
            if !seen.insert(library.name.as_str()) {
                return Err(BuildError::DuplicateLibrary(library.name.clone()));
            }
        }

        let precompiled_headers = config
            .precompiled_headers
            .iter()
            .filter(|h| platform_matches(&h.platforms))
            .map(|h| header_from_config(h, root))
            .collect::<Result<Vec<_>, _>>()?;

        for header in &precompiled_headers {
            if let Some(name) = &header.library
                && !seen.contains(name.as_str())
            {
                return Err(BuildError::UnknownLibrary {
                    owner: header.source.to_string(),
                    name: name.clone(),
                });
            }
        }

        let executables = config
            .executables
            .iter()
            .filter(|e| platform_matches(&e.platforms))
            .map(|e| executable_from_config(e, root))
            .collect::<Result<Vec<_>, _>>()?;

        for exe in &executables {
            for name in exe.depends_on.iter().flatten() {
                if !seen.contains(name.as_str()) {
                    return Err(BuildError::UnknownLibrary {
                        owner: exe.name.clone(),
                        name: name.clone(),
                    });
                }
            }
        }

        Ok(Self {
            settings,
            precompiled_headers,
            static_libraries,
            executables,
        })
    }

    /// Headers whose compiled form is force-included into `library`.
    pub fn headers_for_library(&self, library: &StaticLibrary) -> Vec<&PreCompiledHeader> {
        self.precompiled_headers
            .iter()
            .filter(|h| h.library.as_deref().is_none_or(|name| name == library.name))
            .collect()
    }

    /// Libraries `exe` links against, dependents first.
    ///
    /// Libraries without sources produce no archive and are left off the
    /// link line; their own dependencies still take part.
    pub fn link_libraries(
        &self,
        graph: &DependencyGraph,
        exe: &Executable,
    ) -> Result<Vec<&StaticLibrary>, BuildError> {
        let roots = match &exe.depends_on {
            Some(names) => graph.lookup(&exe.name, names)?,
            None => (0..graph.len()).collect(),
        };
        Ok(graph
            .link_order(&roots)?
            .into_iter()
            .map(|i| &self.static_libraries[i])
            .filter(|l| !l.sources.is_empty())
            .collect())
    }

    /// Headers force-included into executables: only the unattached ones.
    pub fn headers_for_executables(&self) -> Vec<&PreCompiledHeader> {
        self.precompiled_headers
            .iter()
            .filter(|h| h.library.is_none())
            .collect()
    }
}

fn merge_global_defines(raw: &[String]) -> Vec<Define> {
    let mut defines: Vec<Define> = Vec::new();
    for define in raw.iter().map(|d| Define::parse(d)) {
        if let Some(existing) = defines.iter_mut().find(|d| d.name == define.name) {
            tracing::warn!("redefining `{}` macro", define.name);
            existing.value = define.value;
        } else {
            defines.push(define);
        }
    }
    defines
}

fn parse_defines(raw: &[String]) -> Vec<Define> {
    raw.iter().map(|d| Define::parse(d)).collect()
}

fn resolve_dirs(root: &Path, dirs: &[PathBuf]) -> Vec<PathBuf> {
    dirs.iter().map(|d| root.join(d)).collect()
}

/// Expand `sources` into source files. Directories contribute every
/// translation unit beneath them, in sorted order.
fn expand_sources(root: &Path, entries: &[SourceEntry]) -> Result<Vec<SourceFile>, BuildError> {
    let mut sources = Vec::new();
    for entry in entries {
        let full = root.join(entry.path());
        if full.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(&full)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| Language::of_source(e.path()).is_some())
                .filter_map(|e| {
                    e.path()
                        .strip_prefix(&full)
                        .ok()
                        .map(|rel| entry.path().join(rel))
                })
                .collect();
            found.sort();
            for declared in found {
                sources.push(SourceFile::with_watches(root, declared, entry.watches())?);
            }
        } else {
            sources.push(SourceFile::with_watches(
                root,
                entry.path().to_path_buf(),
                entry.watches(),
            )?);
        }
    }
    Ok(sources)
}

fn header_from_config(
    config: &PrecompiledHeaderConfig,
    root: &Path,
) -> Result<PreCompiledHeader, BuildError> {
    Ok(PreCompiledHeader {
        source: SourceFile::new(root, config.source.clone())?,
        extra_build_flags: config.flags.clone(),
        extra_defines: parse_defines(&config.defines),
        library: config.library.clone(),
    })
}

fn library_from_config(
    config: &StaticLibraryConfig,
    root: &Path,
) -> Result<StaticLibrary, BuildError> {
    if config.name.trim().is_empty() {
        return Err(BuildError::Config(
            "static library with an empty name".to_string(),
        ));
    }
    Ok(StaticLibrary {
        name: config.name.clone(),
        output_dir: root.join(&config.output),
        sources: expand_sources(root, &config.sources)?,
        extra_build_flags: config.flags.clone(),
        extra_defines: parse_defines(&config.defines),
        depends_on: config.depends_on.clone(),
        include_directories: resolve_dirs(root, &config.include_directories),
        force_cxx: config.force_cxx,
    })
}

fn executable_from_config(
    config: &ExecutableConfig,
    root: &Path,
) -> Result<Executable, BuildError> {
    if config.name.trim().is_empty() {
        return Err(BuildError::Config("executable with an empty name".to_string()));
    }
    Ok(Executable {
        name: config.name.clone(),
        output_dir: root.join(&config.output),
        sources: expand_sources(root, &config.sources)?,
        extra_build_flags: config.flags.clone(),
        extra_link_flags: config.link_flags.clone(),
        extra_defines: parse_defines(&config.defines),
        include_directories: resolve_dirs(root, &config.include_directories),
        library_directories: resolve_dirs(root, &config.library_directories),
        system_libraries: config.system_libraries.clone(),
        depends_on: config.depends_on.clone(),
        force_cxx: config.force_cxx,
    })
}
