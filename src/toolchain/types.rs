use crate::errors::BuildError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Supported compiler families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainFamily {
    /// GNU Compiler Collection (gcc / g++)
    Gnu,
    /// Clang/LLVM (clang / clang++)
    Clang,
}

impl ToolchainFamily {
    pub fn default_cc(&self) -> &'static str {
        match self {
            ToolchainFamily::Gnu => "gcc",
            ToolchainFamily::Clang => "clang",
        }
    }

    pub fn default_cxx(&self) -> &'static str {
        match self {
            ToolchainFamily::Gnu => "g++",
            ToolchainFamily::Clang => "clang++",
        }
    }

    /// Extension of the compiled header artifact placed beside the header.
    pub fn pch_extension(&self) -> &'static str {
        match self {
            ToolchainFamily::Gnu => "gch",
            ToolchainFamily::Clang => "pch",
        }
    }

    /// Compiled header produced for `header`.
    pub fn pch_output(&self, header: &Path) -> PathBuf {
        let mut name = header.as_os_str().to_os_string();
        name.push(".");
        name.push(self.pch_extension());
        PathBuf::from(name)
    }

    /// Flags that make a translation unit use the compiled `header`.
    ///
    /// GCC picks up `<header>.gch` on its own when the header is force
    /// included; Clang needs the compiled artifact named explicitly.
    pub fn pch_include_flags(&self, header: &Path) -> Vec<String> {
        match self {
            ToolchainFamily::Gnu => vec!["-include".to_string(), header.display().to_string()],
            ToolchainFamily::Clang => vec![
                "-include-pch".to_string(),
                self.pch_output(header).display().to_string(),
            ],
        }
    }
}

impl FromStr for ToolchainFamily {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gnu" | "gcc" | "g++" => Ok(ToolchainFamily::Gnu),
            "clang" | "clang++" | "llvm" => Ok(ToolchainFamily::Clang),
            _ => Err(BuildError::UnsupportedToolchain(s.to_string())),
        }
    }
}

impl fmt::Display for ToolchainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolchainFamily::Gnu => write!(f, "gnu"),
            ToolchainFamily::Clang => write!(f, "clang"),
        }
    }
}

/// Concrete programs used for every compile, archive and link step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub family: ToolchainFamily,

    /// C compiler
    pub cc: String,

    /// C++ compiler
    pub cxx: String,

    /// Linker driver (the C++ compiler unless overridden)
    pub linker: String,

    /// Static archiver
    pub archiver: String,
}

impl Toolchain {
    /// Family defaults with no overrides.
    pub fn new(family: ToolchainFamily) -> Self {
        Self {
            family,
            cc: family.default_cc().to_string(),
            cxx: family.default_cxx().to_string(),
            linker: family.default_cxx().to_string(),
            archiver: "ar".to_string(),
        }
    }
}
