//! Argument vector construction for the GNU-compatible driver interface.

use crate::register::{Artifact, PreCompiledHeader, Settings};
use crate::source_file::Language;
use std::path::Path;

/// Base compile commands for one artifact, one per language.
///
/// Each vector holds the compiler, standard, optimization, flags, defines,
/// include directories and precompiled header flags. Per-file arguments are
/// appended by [`CommandPair::compile`] and [`CommandPair::precompile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPair {
    pub c: Vec<String>,
    pub cxx: Vec<String>,
}

impl CommandPair {
    /// Base command for `language`.
    pub fn for_language(&self, language: Language) -> &[String] {
        match language {
            Language::C => &self.c,
            Language::Cxx => &self.cxx,
        }
    }

    /// Full command compiling `source` into `object`.
    ///
    /// Unknown extensions are compiled as C++.
    pub fn compile(&self, source: &Path, object: &Path) -> Vec<String> {
        let language = Language::of_source(source).unwrap_or_else(|| {
            tracing::warn!(
                "unknown source extension for {}, compiling as C++",
                source.display()
            );
            Language::Cxx
        });
        let mut argv = self.for_language(language).to_vec();
        argv.extend([
            "-c".to_string(),
            "-o".to_string(),
            object.display().to_string(),
            source.display().to_string(),
        ]);
        argv
    }

    /// Full command compiling `header` into `output`.
    pub fn precompile(&self, header: &Path, output: &Path) -> Vec<String> {
        let language = Language::of_header(header).unwrap_or(Language::Cxx);
        let mut argv = self.for_language(language).to_vec();
        let kind = match language {
            Language::C => "c-header",
            Language::Cxx => "c++-header",
        };
        argv.extend([
            "-x".to_string(),
            kind.to_string(),
            header.display().to_string(),
            "-o".to_string(),
            output.display().to_string(),
        ]);
        argv
    }
}

/// Assemble the base compile commands for `artifact`.
///
/// `headers` are the precompiled headers force-included into the artifact.
/// C++ headers only reach the C++ command. C headers reach both, but C++
/// units include them as plain text. With `force_cxx` the C command is
/// replaced by the C++ one.
pub fn build_commands(
    settings: &Settings,
    artifact: Artifact<'_>,
    headers: &[&PreCompiledHeader],
) -> CommandPair {
    let tc = &settings.toolchain;
    let mut c = vec![tc.cc.clone(), format!("-std=gnu{}", settings.c_standard)];
    let mut cxx = vec![tc.cxx.clone(), format!("-std=c++{}", settings.cxx_standard)];

    let optimization = if settings.release { "-O3" } else { "-g" };
    let mut shared = vec![optimization.to_string()];

    shared.extend(artifact.extra_build_flags().iter().cloned());
    shared.extend(settings.build_flags.iter().cloned());

    for define in settings.defines.iter().chain(artifact.extra_defines()) {
        shared.push(define.to_flag());
    }

    for dir in artifact
        .include_directories()
        .iter()
        .chain(&settings.include_directories)
    {
        shared.push(format!("-I{}", dir.display()));
    }

    c.extend(shared.iter().cloned());
    cxx.extend(shared);

    for header in headers {
        let path = header.source.path();
        let flags = tc.family.pch_include_flags(path);
        if Language::of_header(path) == Some(Language::C) {
            c.extend(flags);
            // The compiled form of a C header only serves C units.
            cxx.extend(["-include".to_string(), path.display().to_string()]);
        } else {
            cxx.extend(flags);
        }
    }

    if artifact.force_cxx() {
        c = cxx.clone();
    }

    CommandPair { c, cxx }
}

/// `ar rcs <archive> <objects...>`
pub fn archive_command(archiver: &str, archive: &Path, objects: &[&Path]) -> Vec<String> {
    let mut argv = vec![
        archiver.to_string(),
        "rcs".to_string(),
        archive.display().to_string(),
    ];
    argv.extend(objects.iter().map(|o| o.display().to_string()));
    argv
}

/// Inputs of one link step, in the order they appear on the command line.
#[derive(Debug, Clone)]
pub struct LinkInputs<'a> {
    pub extra_link_flags: &'a [String],
    pub library_directories: Vec<String>,
    pub output: &'a Path,
    pub objects: Vec<&'a Path>,
    /// Static library names, dependents before their dependencies.
    pub libraries: Vec<&'a str>,
    pub system_libraries: &'a [String],
}

pub fn link_command(settings: &Settings, inputs: &LinkInputs<'_>) -> Vec<String> {
    let mut argv = vec![settings.toolchain.linker.clone()];
    argv.extend(settings.link_flags.iter().cloned());
    argv.extend(inputs.extra_link_flags.iter().cloned());
    argv.extend(inputs.library_directories.iter().map(|d| format!("-L{d}")));
    argv.push("-o".to_string());
    argv.push(inputs.output.display().to_string());
    argv.extend(inputs.objects.iter().map(|o| o.display().to_string()));
    argv.extend(inputs.libraries.iter().map(|l| format!("-l{l}")));
    argv.extend(inputs.system_libraries.iter().map(|l| format!("-l{l}")));
    argv
}
