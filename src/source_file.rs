//! Declared source files.
//!
//! A [`SourceFile`] is created once per declared path during configuration and
//! never changes afterwards. Construction fails fast when the file is missing.

use crate::errors::BuildError;
use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Language a translation unit or header is compiled as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cxx,
}

impl Language {
    /// Language of a translation unit, judged by extension.
    pub fn of_source(path: &Path) -> Option<Language> {
        match path.extension()?.to_str()? {
            "c" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "c++" | "cp" | "C" => Some(Language::Cxx),
            _ => None,
        }
    }

    /// Language of a header, judged by extension.
    pub fn of_header(path: &Path) -> Option<Language> {
        match path.extension()?.to_str()? {
            "h" => Some(Language::C),
            "hpp" | "hh" | "hxx" | "h++" | "H" => Some(Language::Cxx),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
    declared: PathBuf,
    watches: Vec<SourceFile>,
}

impl SourceFile {
    /// Resolve `declared` against the project `root`.
    pub fn new(root: &Path, declared: impl Into<PathBuf>) -> Result<Self, BuildError> {
        Self::with_watches(root, declared, &[])
    }

    /// Like [`SourceFile::new`], plus extra files whose change forces a rebuild.
    pub fn with_watches(
        root: &Path,
        declared: impl Into<PathBuf>,
        watches: &[PathBuf],
    ) -> Result<Self, BuildError> {
        let declared = declared.into();
        let path = root.join(&declared);
        if !path.exists() {
            return Err(BuildError::MissingSource(path));
        }
        let watches = watches
            .iter()
            .map(|w| SourceFile::new(root, w.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            path,
            declared,
            watches,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path exactly as written in the configuration.
    pub fn declared(&self) -> &Path {
        &self.declared
    }

    pub fn watches(&self) -> &[SourceFile] {
        &self.watches
    }

    /// Object file for this source inside `object_dir`.
    ///
    /// The full file name is kept (`a.c` -> `a.c.o`) so sources differing only
    /// by extension never share an object. Parent and root components are
    /// neutralized so the object always lands under `object_dir`.
    pub fn object_path(&self, object_dir: &Path) -> PathBuf {
        let mut out = object_dir.to_path_buf();
        for component in self.declared.components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::ParentDir => out.push("__"),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        let mut name = out
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("unnamed"));
        name.push(".o");
        out.set_file_name(name);
        out
    }
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.declared.display())
    }
}
