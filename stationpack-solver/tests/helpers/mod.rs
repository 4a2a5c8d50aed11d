//! Runs the solver binary on the files in `tests/data`.
#![allow(
    dead_code,
    reason = "is used in integration tests but unable to find a way to silence these warnings"
)]

use std::fs::File;
use std::path::PathBuf;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;

use stationpack_solver::data::ChannelSpecificConstraintManager;
use stationpack_solver::data::DomainStationManager;
use stationpack_solver::SolverResult;
use stationpack_solver::StationPackingInstance;
use wait_timeout::ChildExt;

const TEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub(crate) struct Run {
    pub(crate) status: ExitStatus,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

impl Run {
    /// The results printed by the solver, one per line.
    pub(crate) fn results(&self) -> Vec<SolverResult> {
        self.stdout
            .lines()
            .map(|line| serde_json::from_str(line).expect("every output line is a result"))
            .collect()
    }
}

pub(crate) fn data_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

pub(crate) fn read_instance(name: &str) -> StationPackingInstance {
    let file = File::open(data_file(name)).expect("test instance exists");
    serde_json::from_reader(file).expect("test instance is valid")
}

pub(crate) fn load_constraints() -> ChannelSpecificConstraintManager {
    let stations = DomainStationManager::from_csv(
        File::open(data_file("domains.csv")).expect("domain file exists"),
    )
    .expect("domain file is valid");

    ChannelSpecificConstraintManager::from_csv(
        File::open(data_file("interference.csv")).expect("interference file exists"),
        &stations,
    )
    .expect("interference file is valid")
}

/// Runs the solver on the given instances with the fixture data files and `args`.
///
/// `prefix` names the files the output is captured in, so tests can run in parallel.
pub(crate) fn run_solver(prefix: &str, instances: &[&str], args: &[&str]) -> Run {
    let solver = PathBuf::from(env!("CARGO_BIN_EXE_stationpack-solver"));
    let out_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR"));
    let stdout_path = out_dir.join(format!("{prefix}.log"));
    let stderr_path = out_dir.join(format!("{prefix}.err"));

    let mut command = Command::new(solver);
    let _ = command
        .arg("--domains")
        .arg(data_file("domains.csv"))
        .arg("--interference")
        .arg(data_file("interference.csv"))
        .args(args);

    for instance in instances {
        let _ = command.arg(data_file(instance));
    }

    let mut child = command
        .stdout(File::create(&stdout_path).expect("Failed to create log file."))
        .stderr(File::create(&stderr_path).expect("Failed to create error file."))
        .stdin(Stdio::null())
        .spawn()
        .expect("Failed to run solver.");

    let status = match child.wait_timeout(TEST_TIMEOUT) {
        Ok(None) => {
            let _ = child.kill();
            panic!("solver took more than {} seconds", TEST_TIMEOUT.as_secs())
        }
        Ok(Some(status)) => status,
        Err(e) => panic!("error starting solver: {e}"),
    };

    let run = Run {
        status,
        stdout: std::fs::read_to_string(&stdout_path).expect("log file is readable"),
        stderr: std::fs::read_to_string(&stderr_path).expect("error file is readable"),
    };

    std::fs::remove_file(stdout_path).expect("log file can be removed");
    std::fs::remove_file(stderr_path).expect("error file can be removed");

    run
}
