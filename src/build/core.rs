use super::feedback::FeedbackAnalyzer;
use super::{BuildOptions, load_register};
use crate::change::ChangeDetector;
use crate::errors::BuildError;
use crate::graph::DependencyGraph;
use crate::ledger::BuildLedger;
use crate::register::{Artifact, Executable, PreCompiledHeader, Register, StaticLibrary};
use crate::scheduler::{Command, CommandQueue, ProcessPool, Scheduler};
use crate::toolchain::{CommandPair, LinkInputs, archive_command, build_commands, link_command};
use anyhow::Result;
use colored::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Number of commands of each kind a build issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub headers: usize,
    pub compiled: usize,
    pub archived: usize,
    pub linked: usize,
}

impl BuildReport {
    pub fn commands(&self) -> usize {
        self.headers + self.compiled + self.archived + self.linked
    }

    pub fn is_noop(&self) -> bool {
        self.commands() == 0
    }
}

/// Everything decided before the first process is spawned.
#[derive(Debug)]
pub struct BuildPlan {
    pub queue: CommandQueue,
    pub report: BuildReport,
    /// Ledger entries to persist once the queue ran successfully.
    pub pending: BuildLedger,
    /// Output directories the queued commands write into.
    pub directories: BTreeSet<PathBuf>,
    /// Archives whose member list changed; removed before re-archiving.
    pub stale_archives: Vec<PathBuf>,
}

impl BuildPlan {
    fn prepare(&self) -> Result<(), BuildError> {
        for dir in &self.directories {
            fs::create_dir_all(dir)?;
        }
        for archive in &self.stale_archives {
            if archive.exists() {
                tracing::info!("removing {} before re-archiving", archive.display());
                fs::remove_file(archive)?;
            }
        }
        Ok(())
    }
}

fn parent_of(path: &Path) -> Option<PathBuf> {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

pub(crate) fn header_commands(register: &Register, header: &PreCompiledHeader) -> CommandPair {
    build_commands(&register.settings, Artifact::Header(header), &[])
}

pub(crate) fn library_commands(register: &Register, library: &StaticLibrary) -> CommandPair {
    let headers = register.headers_for_library(library);
    build_commands(&register.settings, Artifact::Library(library), &headers)
}

pub(crate) fn executable_commands(register: &Register, exe: &Executable) -> CommandPair {
    let headers = register.headers_for_executables();
    build_commands(&register.settings, Artifact::Executable(exe), &headers)
}

/// Compile every stale source of one artifact. Returns true when anything
/// was queued.
fn plan_sources(
    plan: &mut BuildPlan,
    detector: &mut ChangeDetector<'_>,
    register: &Register,
    pair: &CommandPair,
    artifact: Artifact<'_>,
    headers: &[&PreCompiledHeader],
    rebuilt_headers: &BTreeSet<PathBuf>,
) -> bool {
    let build_dir = &register.settings.build_dir;
    let (sources, object_dir) = match artifact {
        Artifact::Library(lib) => (&lib.sources, lib.object_dir(build_dir)),
        Artifact::Executable(exe) => (&exe.sources, exe.object_dir(build_dir)),
        Artifact::Header(_) => return false,
    };
    let implicit: Vec<&Path> = headers.iter().map(|h| h.source.path()).collect();
    let header_rebuilt = headers
        .iter()
        .any(|h| rebuilt_headers.contains(h.source.path()));

    let mut queued = false;
    for source in sources {
        let object = source.object_path(&object_dir);
        let argv = pair.compile(source.path(), &object);
        let stale = detector.needs_rebuild(
            source,
            &object,
            &argv,
            artifact.include_directories(),
            &implicit,
        ) || header_rebuilt;
        if stale {
            if let Some(dir) = parent_of(&object) {
                plan.directories.insert(dir);
            }
            plan.queue.push(Command::execute(
                argv,
                format!("compiling {source}"),
                format!("failed to compile {source}"),
            ));
            plan.report.compiled += 1;
            queued = true;
        }
    }
    queued
}

/// Decide which commands the next build must run.
///
/// Stages are separated by barriers: precompiled headers, library objects,
/// archives, executable objects, links.
pub fn plan(
    register: &Register,
    graph: &DependencyGraph,
    ledger: &BuildLedger,
    force: bool,
) -> Result<BuildPlan, BuildError> {
    let settings = &register.settings;
    let mut detector = ChangeDetector::new(ledger, &settings.include_directories, force);
    let mut plan = BuildPlan {
        queue: CommandQueue::new(),
        report: BuildReport::default(),
        pending: BuildLedger::default(),
        directories: BTreeSet::new(),
        stale_archives: Vec::new(),
    };

    // 1. Precompiled headers
    let mut rebuilt_headers = BTreeSet::new();
    for header in &register.precompiled_headers {
        let source = header.source.path();
        let output = settings.toolchain.family.pch_output(source);
        let argv = header_commands(register, header).precompile(source, &output);
        if detector.needs_rebuild(&header.source, &output, &argv, &[], &[]) {
            plan.queue.push(Command::execute(
                argv,
                format!("precompiling {}", header.source),
                format!("failed to precompile {}", header.source),
            ));
            plan.report.headers += 1;
            rebuilt_headers.insert(source.to_path_buf());
        }
    }
    plan.queue.barrier();

    let all_sources = register
        .static_libraries
        .iter()
        .flat_map(|l| &l.sources)
        .chain(register.executables.iter().flat_map(|e| &e.sources));
    detector.prime(all_sources.map(|s| s.path()));

    // 2. Library objects, then archives
    let order = graph.resolve_order()?;
    let mut library_changed = vec![false; register.static_libraries.len()];
    for &index in &order {
        let library = &register.static_libraries[index];
        let headers = register.headers_for_library(library);
        let pair = library_commands(register, library);
        library_changed[index] = plan_sources(
            &mut plan,
            &mut detector,
            register,
            &pair,
            Artifact::Library(library),
            &headers,
            &rebuilt_headers,
        );
    }
    plan.queue.barrier();

    let mut archived = vec![false; register.static_libraries.len()];
    for &index in &order {
        let library = &register.static_libraries[index];
        if library.sources.is_empty() {
            tracing::warn!("static library `{}` has no sources", library.name);
            continue;
        }
        let archive = library.archive_path();
        let objects = library.objects(&settings.build_dir);
        let object_refs: Vec<&Path> = objects.iter().map(PathBuf::as_path).collect();
        let argv = archive_command(&settings.toolchain.archiver, &archive, &object_refs);

        let drifted = detector.invocation_drifted(&archive, &argv);
        let stale = detector.output_stale(&archive, &argv);
        if library_changed[index] || stale {
            if drifted {
                plan.stale_archives.push(archive.clone());
            }
            plan.directories.insert(library.output_dir.clone());
            plan.queue.push(Command::execute(
                argv,
                format!("archiving lib{}.a", library.name),
                format!("failed to archive {}", library.name),
            ));
            plan.report.archived += 1;
            archived[index] = true;
        }
    }
    plan.queue.barrier();

    // 3. Executable objects, then links
    let exe_headers = register.headers_for_executables();
    let mut exe_changed = Vec::with_capacity(register.executables.len());
    for exe in &register.executables {
        let pair = executable_commands(register, exe);
        exe_changed.push(plan_sources(
            &mut plan,
            &mut detector,
            register,
            &pair,
            Artifact::Executable(exe),
            &exe_headers,
            &rebuilt_headers,
        ));
    }
    plan.queue.barrier();

    for (exe, changed) in register.executables.iter().zip(exe_changed) {
        let libraries = register.link_libraries(graph, exe)?;
        let objects = exe.objects(&settings.build_dir);

        let mut library_directories: Vec<String> = Vec::new();
        for dir in exe
            .library_directories
            .iter()
            .chain(libraries.iter().map(|l| &l.output_dir))
        {
            let dir = dir.display().to_string();
            if !library_directories.contains(&dir) {
                library_directories.push(dir);
            }
        }

        let output = exe.output_path();
        let inputs = LinkInputs {
            extra_link_flags: &exe.extra_link_flags,
            library_directories,
            output: &output,
            objects: objects.iter().map(PathBuf::as_path).collect(),
            libraries: libraries.iter().map(|l| l.name.as_str()).collect(),
            system_libraries: &exe.system_libraries,
        };
        let argv = link_command(settings, &inputs);

        let dependency_changed = libraries
            .iter()
            .any(|l| graph.index_of(&l.name).is_some_and(|i| archived[i]));
        let stale = detector.output_stale(&output, &argv);
        if changed || dependency_changed || stale {
            if let Some(dir) = parent_of(&output) {
                plan.directories.insert(dir);
            }
            plan.queue.push(Command::execute(
                argv,
                format!("linking {}", exe.name),
                format!("failed to link {}", exe.name),
            ));
            plan.report.linked += 1;
        }
    }

    plan.pending = detector.into_pending();
    Ok(plan)
}

/// Run the full pipeline against `scheduler`.
///
/// Configuration errors surface before anything is spawned. The ledger is
/// only written when every queued command succeeded.
pub fn build(
    register: &Register,
    scheduler: &mut dyn Scheduler,
    force: bool,
) -> Result<BuildReport, BuildError> {
    let graph = DependencyGraph::from_register(register)?;
    graph.resolve_order()?;

    let build_dir = &register.settings.build_dir;
    let mut ledger = BuildLedger::load(build_dir);
    let plan = plan(register, &graph, &ledger, force)?;
    tracing::info!(
        "planned {} commands ({} compile, {} archive, {} link)",
        plan.report.commands(),
        plan.report.headers + plan.report.compiled,
        plan.report.archived,
        plan.report.linked
    );

    plan.prepare()?;
    scheduler.execute(plan.queue)?;

    ledger.apply(plan.pending);
    ledger.save(build_dir)?;
    Ok(plan.report)
}

fn print_dry_run(register: &Register, force: bool) -> Result<()> {
    let graph = DependencyGraph::from_register(register)?;
    let ledger = BuildLedger::load(&register.settings.build_dir);
    let plan = plan(register, &graph, &ledger, force)?;
    if plan.report.is_noop() {
        println!("{} Everything is up to date", "⚡".yellow());
        return Ok(());
    }
    for command in plan.queue.iter() {
        match command {
            Command::Execute { argv, .. } => println!("{}", argv.join(" ")),
            Command::Barrier => println!("{}", "# barrier".dimmed()),
        }
    }
    Ok(())
}

/// `buildit build`: load the project, run the pipeline, print a summary.
pub fn run_build(config_path: &Path, options: &BuildOptions) -> Result<BuildReport> {
    let mut register = load_register(config_path)?;
    if options.release {
        register.settings.release = true;
    }

    if options.dry_run {
        print_dry_run(&register, options.force)?;
        return Ok(BuildReport::default());
    }

    let profile = if register.settings.release {
        "release"
    } else {
        "debug"
    };
    println!(
        "{} Building {} ({}, {} jobs)",
        "🔨".cyan(),
        config_path.display(),
        profile,
        options.concurrency
    );

    let start = Instant::now();
    let mut pool = ProcessPool::new(options.concurrency, &register.settings.root)
        .with_progress(options.progress);

    match build(&register, &mut pool, options.force) {
        Ok(report) if report.is_noop() => {
            println!("{} Everything is up to date", "⚡".yellow());
            Ok(report)
        }
        Ok(report) => {
            println!(
                "{} Finished: {} compiled, {} archived, {} linked in {:.2}s",
                "✓".green(),
                report.headers + report.compiled,
                report.archived,
                report.linked,
                start.elapsed().as_secs_f64()
            );
            Ok(report)
        }
        Err(e) => {
            if let BuildError::CommandFailed { output, .. } = &e
                && let Some(hint) = FeedbackAnalyzer::analyze(output)
            {
                eprintln!("\n{} {}", "💡".yellow(), hint);
            }
            Err(e.into())
        }
    }
}
