use std::io::Read;
use std::io::Write;
use std::path::PathBuf;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use log::debug;
use log::warn;
use wait_timeout::ChildExt;

use super::BackendError;
use super::InterruptRegistry;
use super::SatSolver;
use super::SatSolverResult;
use crate::basic_types::SatResult;
use crate::basic_types::Stopwatch;
use crate::sat::dimacs::parse_solver_output;
use crate::sat::Cnf;
use crate::termination::TerminationCriterion;

/// The placeholder in the arguments of an [`ExternalProcessBackend`] which is replaced by the
/// seed of the solve call.
pub const SEED_PLACEHOLDER: &str = "{seed}";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A [`SatSolver`] which runs a SAT competition style solver executable per formula.
///
/// The formula is written as DIMACS to the standard input of the process, and the `s`/`v` lines
/// on its standard output are read back. The process is killed when the termination criterion
/// expires or when the backend is interrupted. Any failure to run the process or to understand
/// its output is reported as [`SatResult::Crashed`].
#[derive(Debug)]
pub struct ExternalProcessBackend {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    running: InterruptRegistry,
    shut_down: AtomicBool,
}

impl ExternalProcessBackend {
    pub fn new(program: impl Into<PathBuf>) -> ExternalProcessBackend {
        let program = program.into();
        let name = program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "external".to_owned());

        ExternalProcessBackend {
            name,
            program,
            args: Vec::new(),
            running: InterruptRegistry::default(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Adds arguments passed to every run. [`SEED_PLACEHOLDER`] is replaced by the seed.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn spawn(&self, seed: u64) -> std::io::Result<Child> {
        let mut command = Command::new(&self.program);
        for arg in self.args.iter() {
            let _ = command.arg(arg.replace(SEED_PLACEHOLDER, &seed.to_string()));
        }

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
    }

    fn crashed(&self, stopwatch: &Stopwatch, reason: impl std::fmt::Display) -> SatSolverResult {
        warn!("{}: {reason}", self.name);
        SatSolverResult::without_model(SatResult::Crashed, stopwatch.elapsed_seconds())
    }
}

impl SatSolver for ExternalProcessBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn solve(
        &self,
        cnf: &Cnf,
        termination: &dyn TerminationCriterion,
        seed: u64,
    ) -> SatSolverResult {
        let stopwatch = Stopwatch::starting_now();

        if self.shut_down.load(Ordering::Relaxed) {
            return SatSolverResult::without_model(SatResult::Crashed, 0.0);
        }

        let registration = self.running.register();

        let mut child = match self.spawn(seed) {
            Ok(child) => child,
            Err(error) => return self.crashed(&stopwatch, format!("failed to start: {error}")),
        };

        // Input and output go through their own threads; this thread only polls the process, the
        // termination criterion and the interrupt flag.
        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut output = String::new();
                stdout.read_to_string(&mut output).map(|_| output)
            })
        });

        if let Some(mut stdin) = child.stdin.take() {
            let input = cnf.to_dimacs().into_bytes();
            let name = self.name.clone();
            let _ = thread::spawn(move || {
                // Dropping `stdin` at the end closes the pipe.
                if let Err(error) = stdin.write_all(&input).and_then(|_| stdin.flush()) {
                    debug!("{name}: the process stopped reading its input: {error}");
                }
            });
        }

        let status = loop {
            match child.wait_timeout(POLL_INTERVAL) {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    let stop = if registration.is_interrupted() {
                        Some(SatResult::Killed)
                    } else if termination.has_expired() {
                        Some(SatResult::Timeout)
                    } else {
                        None
                    };

                    if let Some(result) = stop {
                        if let Err(error) = child.kill().and_then(|_| child.wait()) {
                            warn!("{}: failed to stop the process: {error}", self.name);
                        }
                        return SatSolverResult::without_model(result, stopwatch.elapsed_seconds());
                    }
                }
                Err(error) => {
                    let _ = child.kill().and_then(|_| child.wait());
                    return self.crashed(&stopwatch, format!("failed to wait: {error}"));
                }
            }
        };

        let output = match reader.map(|reader| reader.join()) {
            Some(Ok(Ok(output))) => output,
            Some(Ok(Err(error))) => {
                return self.crashed(&stopwatch, format!("failed to read output: {error}"))
            }
            Some(Err(_)) | None => return self.crashed(&stopwatch, "lost the output stream"),
        };

        match parse_solver_output(&output) {
            Ok((result, model)) => {
                debug!(
                    "{}: {result} in {:.3}s (exit status {status})",
                    self.name,
                    stopwatch.elapsed_seconds()
                );
                SatSolverResult::new(result, stopwatch.elapsed_seconds(), model)
            }
            Err(_) if status.code() == Some(20) => {
                SatSolverResult::without_model(SatResult::Unsat, stopwatch.elapsed_seconds())
            }
            Err(error) => self.crashed(
                &stopwatch,
                format!("unreadable output (exit status {status}): {error}"),
            ),
        }
    }

    fn interrupt(&self) -> Result<(), BackendError> {
        self.running.interrupt_all();
        Ok(())
    }

    fn notify_shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::Relaxed) {
            self.running.interrupt_all();
        }
    }
}
