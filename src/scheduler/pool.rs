use super::command::{Command, CommandQueue};
use super::progress::Progress;
use super::{Concurrency, ExecutionSummary, Scheduler};
use crate::errors::BuildError;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{self, Child, Stdio};
use std::thread;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Running {
    child: Child,
    /// Shared stdout/stderr capture of the child.
    capture: File,
    argv: Vec<String>,
    fail_message: String,
}

/// Runs commands as child processes with bounded parallelism.
///
/// Children write into anonymous temporary files rather than pipes, so the
/// non-blocking poll loop never stalls on a full pipe buffer. Captured output
/// is replayed once the child exits.
pub struct ProcessPool {
    concurrency: Concurrency,
    working_dir: PathBuf,
    progress: bool,
    poll_interval: Duration,
}

impl ProcessPool {
    pub fn new(concurrency: Concurrency, working_dir: &Path) -> Self {
        Self {
            concurrency,
            working_dir: working_dir.to_path_buf(),
            progress: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn spawn(&self, argv: &[String]) -> std::io::Result<(Child, File)> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"))?;
        let capture = tempfile::tempfile()?;
        let child = process::Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(capture.try_clone()?)
            .stderr(capture.try_clone()?)
            .spawn()?;
        tracing::debug!("spawned {}", argv.join(" "));
        Ok((child, capture))
    }
}

fn read_capture(mut capture: File) -> String {
    let mut bytes = Vec::new();
    if capture.seek(SeekFrom::Start(0)).is_ok() {
        let _ = capture.read_to_end(&mut bytes);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Best-effort termination of every in-flight command.
fn abort(running: &mut Vec<Running>) {
    for mut task in running.drain(..) {
        tracing::info!("terminating {}", task.argv.join(" "));
        let _ = task.child.kill();
        let _ = task.child.wait();
    }
}

impl Scheduler for ProcessPool {
    fn execute(&mut self, mut queue: CommandQueue) -> Result<ExecutionSummary, BuildError> {
        let mut progress = Progress::new(queue.execute_count(), self.progress);
        let mut running: Vec<Running> = Vec::new();
        let mut at_barrier = false;
        let mut summary = ExecutionSummary::default();

        loop {
            let mut progressed = false;

            while !at_barrier && self.concurrency.admits(running.len()) {
                let Some(command) = queue.pop() else {
                    break;
                };
                progressed = true;
                match command {
                    Command::Barrier => at_barrier = !running.is_empty(),
                    Command::Execute {
                        argv,
                        message,
                        fail_message,
                    } => {
                        progress.started(&message);
                        match self.spawn(&argv) {
                            Ok((child, capture)) => running.push(Running {
                                child,
                                capture,
                                argv,
                                fail_message,
                            }),
                            Err(e) => {
                                abort(&mut running);
                                progress.clear();
                                let program = argv.first().cloned().unwrap_or_default();
                                return Err(BuildError::CommandFailed {
                                    message: format!(
                                        "{fail_message}: could not start `{program}`: {e}"
                                    ),
                                    command: argv,
                                    output: String::new(),
                                });
                            }
                        }
                    }
                }
            }

            let mut i = 0;
            while i < running.len() {
                let status = match running[i].child.try_wait() {
                    Ok(Some(status)) => Ok(status),
                    Ok(None) => {
                        i += 1;
                        continue;
                    }
                    Err(e) => Err(e),
                };

                let task = running.swap_remove(i);
                let output = read_capture(task.capture);
                progress.finished();
                summary.executed += 1;
                progressed = true;

                match status {
                    Ok(status) if status.success() => {
                        if !output.trim().is_empty() {
                            progress.println(output.trim_end());
                        }
                    }
                    failed => {
                        abort(&mut running);
                        if !output.trim().is_empty() {
                            progress.println(output.trim_end());
                        }
                        progress.clear();
                        let message = match failed {
                            Err(e) => format!("{}: {e}", task.fail_message),
                            Ok(_) => task.fail_message,
                        };
                        tracing::debug!("command failed: {}", task.argv.join(" "));
                        return Err(BuildError::CommandFailed {
                            message,
                            command: task.argv,
                            output,
                        });
                    }
                }
            }

            if running.is_empty() {
                at_barrier = false;
                if queue.is_empty() {
                    break;
                }
            }

            if !progressed {
                thread::sleep(self.poll_interval);
            }
        }

        progress.clear();
        Ok(summary)
    }
}
