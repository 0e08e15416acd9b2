//! Incremental rebuild behaviour, driven through a recording scheduler that
//! pretends every command succeeded by touching its output.

use buildit::build::{self, BuildReport};
use buildit::config::parse_config;
use buildit::errors::BuildError;
use buildit::graph::DependencyGraph;
use buildit::ledger::{BuildLedger, LEDGER_FILE};
use buildit::register::Register;
use buildit::scheduler::{Command, CommandQueue, ExecutionSummary, Scheduler};
use buildit::toolchain::{Toolchain, ToolchainFamily};
use std::cell::Cell;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;

#[derive(Default)]
struct RecordingScheduler {
    commands: Vec<Vec<String>>,
    /// Fail the first command mentioning this argument.
    fail_on: Option<String>,
}

fn output_of(argv: &[String]) -> Option<PathBuf> {
    if argv.get(1).map(String::as_str) == Some("rcs") {
        return argv.get(2).map(PathBuf::from);
    }
    argv.iter()
        .position(|a| a == "-o")
        .and_then(|i| argv.get(i + 1))
        .map(PathBuf::from)
}

impl Scheduler for RecordingScheduler {
    fn execute(&mut self, queue: CommandQueue) -> Result<ExecutionSummary, BuildError> {
        let mut summary = ExecutionSummary::default();
        for command in queue {
            let Command::Execute {
                argv, fail_message, ..
            } = command
            else {
                continue;
            };
            self.commands.push(argv.clone());
            if let Some(bad) = &self.fail_on
                && argv.iter().any(|a| a.ends_with(bad.as_str()))
            {
                return Err(BuildError::CommandFailed {
                    message: fail_message,
                    command: argv,
                    output: String::new(),
                });
            }
            if let Some(out) = output_of(&argv) {
                fs::create_dir_all(out.parent().unwrap()).unwrap();
                fs::write(&out, "").unwrap();
            }
            summary.executed += 1;
        }
        Ok(summary)
    }
}

impl RecordingScheduler {
    fn compiled(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter(|argv| argv.contains(&"-c".to_string()))
            .filter_map(|argv| argv.last().cloned())
            .map(|src| {
                Path::new(&src)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

struct Project {
    dir: TempDir,
    clock: Cell<u64>,
}

impl Project {
    fn new(files: &[(&str, &str)]) -> Self {
        let project = Self {
            dir: tempfile::tempdir().unwrap(),
            clock: Cell::new(0),
        };
        for (path, content) in files {
            project.write(path, content);
        }
        project
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Move the modification time of `rel` forward by a distinct amount.
    fn touch(&self, rel: &str) {
        self.clock.set(self.clock.get() + 10);
        let when = SystemTime::now() + Duration::from_secs(self.clock.get());
        File::options()
            .write(true)
            .open(self.root().join(rel))
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    fn register(&self, toml: &str) -> Register {
        let config = parse_config(toml).unwrap();
        Register::with_toolchain(&config, self.root(), Toolchain::new(ToolchainFamily::Gnu)).unwrap()
    }

    fn build(&self, toml: &str) -> (BuildReport, RecordingScheduler) {
        let mut scheduler = RecordingScheduler::default();
        let report = build::build(&self.register(toml), &mut scheduler, false).unwrap();
        (report, scheduler)
    }
}

const LIBRARY_ONLY: &str = r#"
[[static_library]]
name = "L"
sources = ["a.c", "b.c"]
"#;

const WITH_APP: &str = r#"
[[static_library]]
name = "L"
sources = ["a.c", "b.c"]

[[executable]]
name = "app"
sources = ["main.c"]
depends_on = ["L"]
"#;

#[test]
fn second_build_without_changes_does_nothing() {
    let project = Project::new(&[("a.c", "int a;"), ("b.c", "int b;"), ("main.c", "int main;")]);

    let (first, _) = project.build(WITH_APP);
    assert_eq!(first.compiled, 3);
    assert_eq!(first.archived, 1);
    assert_eq!(first.linked, 1);
    assert!(project.root().join("build").join(LEDGER_FILE).exists());

    let (second, scheduler) = project.build(WITH_APP);
    assert!(second.is_noop());
    assert!(scheduler.commands.is_empty());
}

#[test]
fn touching_one_source_recompiles_only_that_source() {
    let project = Project::new(&[("a.c", "int a;"), ("b.c", "int b;")]);
    project.build(LIBRARY_ONLY);
    project.build(LIBRARY_ONLY);

    project.touch("a.c");
    let (report, scheduler) = project.build(LIBRARY_ONLY);
    assert_eq!(scheduler.compiled(), vec!["a.c"]);
    assert_eq!(report.archived, 1);
    assert_eq!(scheduler.commands.len(), 2);
    assert_eq!(scheduler.commands[1][1], "rcs");
}

#[test]
fn touching_a_library_source_relinks_dependents() {
    let project = Project::new(&[("a.c", ""), ("b.c", ""), ("main.c", "")]);
    project.build(WITH_APP);

    project.touch("b.c");
    let (report, scheduler) = project.build(WITH_APP);
    assert_eq!(scheduler.compiled(), vec!["b.c"]);
    assert_eq!(report.archived, 1);
    assert_eq!(report.linked, 1);
}

#[test]
fn new_define_recompiles_each_source_once() {
    let project = Project::new(&[("a.c", ""), ("b.c", "")]);
    project.build(LIBRARY_ONLY);

    let with_define = format!("{LIBRARY_ONLY}defines = [\"FEATURE=1\"]\n");
    let (report, scheduler) = project.build(&with_define);
    assert_eq!(report.compiled, 2);
    let mut compiled = scheduler.compiled();
    compiled.sort();
    assert_eq!(compiled, vec!["a.c", "b.c"]);
    assert!(scheduler.commands[0].contains(&"-DFEATURE=1".to_string()));

    let (again, _) = project.build(&with_define);
    assert!(again.is_noop());
}

#[test]
fn touching_an_included_header_recompiles_its_includer() {
    let project = Project::new(&[
        ("a.c", "#include \"shared.h\"\nint a;"),
        ("b.c", "int b;"),
        ("shared.h", "#pragma once\n"),
    ]);
    project.build(LIBRARY_ONLY);

    project.touch("shared.h");
    let (_, scheduler) = project.build(LIBRARY_ONLY);
    assert_eq!(scheduler.compiled(), vec!["a.c"]);
}

#[test]
fn nested_includes_through_include_directories() {
    let project = Project::new(&[
        ("src/a.c", "#include <api.h>\n"),
        ("include/api.h", "#include \"detail/impl.h\"\n"),
        ("include/detail/impl.h", ""),
    ]);
    let toml = r#"
[build]
include_directories = ["include"]

[[static_library]]
name = "api"
sources = ["src/a.c"]
"#;
    project.build(toml);

    project.touch("include/detail/impl.h");
    let (_, scheduler) = project.build(toml);
    assert_eq!(scheduler.compiled(), vec!["a.c"]);
}

#[test]
fn dependency_cycle_fails_before_any_command() {
    let project = Project::new(&[("x.c", ""), ("y.c", "")]);
    let toml = r#"
[[static_library]]
name = "X"
sources = ["x.c"]
depends_on = ["Y"]

[[static_library]]
name = "Y"
sources = ["y.c"]
depends_on = ["X"]
"#;
    let mut scheduler = RecordingScheduler::default();
    let err = build::build(&project.register(toml), &mut scheduler, false).unwrap_err();
    assert!(matches!(err, BuildError::DependencyCycle { .. }));
    assert!(err.is_configuration());
    assert!(scheduler.commands.is_empty());
}

#[test]
fn link_line_lists_dependents_before_dependencies() {
    let project = Project::new(&[("a.c", ""), ("b.c", ""), ("c.c", ""), ("main.c", "")]);
    let toml = r#"
[[static_library]]
name = "C"
sources = ["c.c"]

[[static_library]]
name = "A"
sources = ["a.c"]
depends_on = ["B"]

[[static_library]]
name = "B"
sources = ["b.c"]
depends_on = ["C"]

[[executable]]
name = "app"
sources = ["main.c"]
depends_on = ["A"]
system_libraries = ["m"]
"#;
    let (_, scheduler) = project.build(toml);
    let link = scheduler.commands.last().unwrap();
    let pos = |flag: &str| link.iter().position(|a| a == flag).unwrap();
    assert!(pos("-lA") < pos("-lB"));
    assert!(pos("-lB") < pos("-lC"));
    assert!(pos("-lC") < pos("-lm"));
}

#[test]
fn archives_follow_dependency_order() {
    let project = Project::new(&[("a.c", ""), ("b.c", "")]);
    let toml = r#"
[[static_library]]
name = "top"
sources = ["a.c"]
depends_on = ["base"]

[[static_library]]
name = "base"
sources = ["b.c"]
"#;
    let (_, scheduler) = project.build(toml);
    let archives: Vec<&str> = scheduler
        .commands
        .iter()
        .filter(|argv| argv[1] == "rcs")
        .map(|argv| argv[2].as_str())
        .collect();
    assert!(archives[0].ends_with("libbase.a"));
    assert!(archives[1].ends_with("libtop.a"));
}

#[test]
fn failed_build_does_not_record_anything() {
    let project = Project::new(&[("a.c", ""), ("b.c", "")]);
    let mut failing = RecordingScheduler {
        fail_on: Some("b.c".to_string()),
        ..Default::default()
    };
    let err = build::build(&project.register(LIBRARY_ONLY), &mut failing, false).unwrap_err();
    assert_eq!(err.to_string(), "failed to compile b.c");
    assert!(!project.root().join("build").join(LEDGER_FILE).exists());

    // a.c compiled fine last time but was never confirmed, so it is redone
    let (report, _) = project.build(LIBRARY_ONLY);
    assert_eq!(report.compiled, 2);
}

#[test]
fn force_rebuilds_everything() {
    let project = Project::new(&[("a.c", ""), ("b.c", "")]);
    project.build(LIBRARY_ONLY);

    let mut scheduler = RecordingScheduler::default();
    let report = build::build(&project.register(LIBRARY_ONLY), &mut scheduler, true).unwrap();
    assert_eq!(report.compiled, 2);
    assert_eq!(report.archived, 1);

    let (after, _) = project.build(LIBRARY_ONLY);
    assert!(after.is_noop());
}

#[test]
fn missing_object_is_rebuilt() {
    let project = Project::new(&[("a.c", ""), ("b.c", "")]);
    project.build(LIBRARY_ONLY);

    fs::remove_file(project.root().join("build/lib/L/a.c.o")).unwrap();
    let (_, scheduler) = project.build(LIBRARY_ONLY);
    assert_eq!(scheduler.compiled(), vec!["a.c"]);
}

#[test]
fn precompiled_header_change_recompiles_its_users() {
    let project = Project::new(&[("pch.h", ""), ("a.c", ""), ("b.c", "")]);
    let toml = r#"
[[precompiled_header]]
source = "pch.h"

[[static_library]]
name = "L"
sources = ["a.c", "b.c"]
"#;
    let (first, scheduler) = project.build(toml);
    assert_eq!(first.headers, 1);
    assert!(scheduler.commands[0].contains(&"c-header".to_string()));
    assert!(scheduler.commands[1].contains(&"-include".to_string()));

    project.touch("pch.h");
    let (report, _) = project.build(toml);
    assert_eq!(report.headers, 1);
    assert_eq!(report.compiled, 2);
}

#[test]
fn removing_a_source_drops_the_stale_archive() {
    let project = Project::new(&[("a.c", ""), ("b.c", "")]);
    project.build(LIBRARY_ONLY);

    let smaller = r#"
[[static_library]]
name = "L"
sources = ["a.c"]
"#;
    let register = project.register(smaller);
    let graph = DependencyGraph::from_register(&register).unwrap();
    let ledger = BuildLedger::load(&register.settings.build_dir);
    let plan = build::plan(&register, &graph, &ledger, false).unwrap();
    assert_eq!(plan.report.compiled, 0);
    assert_eq!(plan.report.archived, 1);
    assert_eq!(
        plan.stale_archives,
        vec![project.root().join("libraries").join("libL.a")]
    );
}

#[test]
fn corrupt_ledger_forces_full_rebuild() {
    let project = Project::new(&[("a.c", ""), ("b.c", "")]);
    project.build(LIBRARY_ONLY);
    fs::write(project.root().join("build").join(LEDGER_FILE), "garbage").unwrap();

    let (report, _) = project.build(LIBRARY_ONLY);
    assert_eq!(report.compiled, 2);
}

#[test]
fn header_shadowed_by_a_new_include_directory_is_tracked() {
    let project = Project::new(&[
        ("a.c", "#include <h.h>\n"),
        ("inc0/h.h", ""),
        ("inc1/h.h", ""),
    ]);
    let before = r#"
[build]
include_directories = ["inc1"]

[[static_library]]
name = "L"
sources = ["a.c"]
"#;
    let after = format!("{before}include_directories = [\"inc0\"]\n");
    project.build(before);

    let (_, scheduler) = project.build(&after);
    assert_eq!(scheduler.compiled(), vec!["a.c"]);

    project.touch("inc0/h.h");
    let (_, scheduler) = project.build(&after);
    assert_eq!(scheduler.compiled(), vec!["a.c"]);

    project.touch("inc1/h.h");
    let (report, _) = project.build(&after);
    assert!(report.is_noop());
}

#[test]
fn mutually_including_headers_keep_no_op_builds_fast() {
    let names: Vec<String> = (0..12).map(|i| format!("h{i}.h")).collect();
    let mut files: Vec<(String, String)> = names
        .iter()
        .map(|name| {
            let mut content = String::from("#pragma once\n");
            for other in names.iter().filter(|o| *o != name) {
                content.push_str(&format!("#include \"{other}\"\n"));
            }
            (name.clone(), content)
        })
        .collect();
    files.push(("a.c".into(), "#include \"h0.h\"\n".into()));
    files.push(("b.c".into(), "#include \"h5.h\"\n".into()));
    let refs: Vec<(&str, &str)> = files
        .iter()
        .map(|(p, c)| (p.as_str(), c.as_str()))
        .collect();
    let project = Project::new(&refs);
    project.build(LIBRARY_ONLY);

    let start = Instant::now();
    let (report, _) = project.build(LIBRARY_ONLY);
    assert!(report.is_noop());
    assert!(start.elapsed() < Duration::from_secs(5));

    project.touch("h9.h");
    let (_, scheduler) = project.build(LIBRARY_ONLY);
    let mut compiled = scheduler.compiled();
    compiled.sort();
    assert_eq!(compiled, vec!["a.c", "b.c"]);
}

#[test]
fn source_shared_by_two_artifacts_settles() {
    let project = Project::new(&[("util.c", ""), ("main.c", "")]);
    let toml = r#"
[[static_library]]
name = "L"
sources = ["util.c"]
defines = ["LIB"]

[[executable]]
name = "app"
sources = ["util.c", "main.c"]
depends_on = ["L"]
"#;
    let (first, scheduler) = project.build(toml);
    assert_eq!(first.compiled, 3);
    let objects: Vec<PathBuf> = scheduler
        .commands
        .iter()
        .filter(|argv| argv.contains(&"-c".to_string()))
        .filter(|argv| argv.last().is_some_and(|src| src.ends_with("util.c")))
        .filter_map(|argv| output_of(argv))
        .collect();
    assert_eq!(objects.len(), 2);
    assert_ne!(objects[0], objects[1]);

    let (second, _) = project.build(toml);
    assert!(second.is_noop());
    let (third, _) = project.build(toml);
    assert!(third.is_noop());
}

#[test]
fn library_without_sources_is_left_off_the_link_line() {
    let project = Project::new(&[("a.c", ""), ("main.c", "")]);
    let toml = r#"
[[static_library]]
name = "base"
sources = ["a.c"]

[[static_library]]
name = "facade"
depends_on = ["base"]

[[executable]]
name = "app"
sources = ["main.c"]
"#;
    let (report, scheduler) = project.build(toml);
    assert_eq!(report.archived, 1);
    let link = scheduler.commands.last().unwrap();
    assert!(link.contains(&"-lbase".to_string()));
    assert!(!link.contains(&"-lfacade".to_string()));
}
