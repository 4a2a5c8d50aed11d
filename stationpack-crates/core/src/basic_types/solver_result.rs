use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use super::Assignment;

/// The outcome of a feasibility check. This is a closed set; no other outcome exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SatResult {
    /// A witness assignment was found.
    Sat,
    /// No assignment exists.
    Unsat,
    /// The time budget ran out before a conclusion was reached.
    Timeout,
    /// The backend failed.
    Crashed,
    /// The solve was interrupted.
    Killed,
}

impl SatResult {
    /// Whether the result settles the feasibility question.
    pub fn is_conclusive(self) -> bool {
        matches!(self, SatResult::Sat | SatResult::Unsat)
    }
}

impl std::fmt::Display for SatResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SatResult::Sat => "SAT",
            SatResult::Unsat => "UNSAT",
            SatResult::Timeout => "TIMEOUT",
            SatResult::Crashed => "CRASHED",
            SatResult::Killed => "KILLED",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SolverResultError {
    #[error("a {0} result cannot carry an assignment")]
    UnexpectedAssignment(SatResult),
    #[error("the runtime must be a non-negative number of seconds")]
    InvalidRuntime,
}

/// The answer to one solve call: the outcome, the seconds spent on it and, only for
/// [`SatResult::Sat`], the witness assignment.
///
/// Serialized as `{"assignment":{"3":["3"]},"runtime":37.4,"result":"SAT"}`; the assignment is
/// left out when it is empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSolverResult")]
pub struct SolverResult {
    #[serde(default, skip_serializing_if = "Assignment::is_empty")]
    assignment: Assignment,
    runtime: f64,
    result: SatResult,
}

impl SolverResult {
    pub fn sat(assignment: Assignment, runtime: f64) -> SolverResult {
        SolverResult {
            assignment,
            runtime: sanitise_runtime(runtime),
            result: SatResult::Sat,
        }
    }

    pub fn unsat(runtime: f64) -> SolverResult {
        SolverResult::without_assignment(SatResult::Unsat, runtime)
    }

    pub fn timeout(runtime: f64) -> SolverResult {
        SolverResult::without_assignment(SatResult::Timeout, runtime)
    }

    pub fn crashed(runtime: f64) -> SolverResult {
        SolverResult::without_assignment(SatResult::Crashed, runtime)
    }

    pub fn killed(runtime: f64) -> SolverResult {
        SolverResult::without_assignment(SatResult::Killed, runtime)
    }

    /// A result without a witness. A [`SatResult::Sat`] built this way has an empty assignment,
    /// which is only valid for an instance without stations.
    pub fn without_assignment(result: SatResult, runtime: f64) -> SolverResult {
        SolverResult {
            assignment: Assignment::new(),
            runtime: sanitise_runtime(runtime),
            result,
        }
    }

    pub fn result(&self) -> SatResult {
        self.result
    }

    pub fn runtime(&self) -> f64 {
        self.runtime
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn into_assignment(self) -> Assignment {
        self.assignment
    }

    pub fn is_conclusive(&self) -> bool {
        self.result.is_conclusive()
    }

    /// The same result with `seconds` added to its runtime.
    pub fn with_added_runtime(mut self, seconds: f64) -> SolverResult {
        self.runtime = sanitise_runtime(self.runtime + seconds);
        self
    }

    /// The same result with its runtime replaced by `seconds`.
    pub fn with_runtime(mut self, seconds: f64) -> SolverResult {
        self.runtime = sanitise_runtime(seconds);
        self
    }
}

fn sanitise_runtime(runtime: f64) -> f64 {
    if runtime.is_finite() && runtime > 0.0 {
        runtime
    } else {
        0.0
    }
}

#[derive(Deserialize)]
struct RawSolverResult {
    #[serde(default)]
    assignment: Assignment,
    runtime: f64,
    result: SatResult,
}

impl TryFrom<RawSolverResult> for SolverResult {
    type Error = SolverResultError;

    fn try_from(raw: RawSolverResult) -> Result<Self, Self::Error> {
        if !raw.runtime.is_finite() || raw.runtime < 0.0 {
            return Err(SolverResultError::InvalidRuntime);
        }

        if raw.result != SatResult::Sat && !raw.assignment.is_empty() {
            return Err(SolverResultError::UnexpectedAssignment(raw.result));
        }

        Ok(SolverResult {
            assignment: raw.assignment,
            runtime: raw.runtime,
            result: raw.result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::Station;

    #[test]
    fn sat_result_serializes_to_the_documented_form() {
        let assignment: Assignment = [(Station::new(3), 3)].into_iter().collect();
        let result = SolverResult::sat(assignment, 37.4);

        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"assignment":{"3":["3"]},"runtime":37.4,"result":"SAT"}"#);

        let parsed: SolverResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn results_without_witness_omit_the_assignment() {
        let json = serde_json::to_string(&SolverResult::timeout(1.5)).unwrap();
        assert_eq!(json, r#"{"runtime":1.5,"result":"TIMEOUT"}"#);

        let parsed: SolverResult =
            serde_json::from_str(r#"{"runtime":0.25,"result":"KILLED"}"#).unwrap();
        assert_eq!(parsed.result(), SatResult::Killed);
        assert!(parsed.assignment().is_empty());
    }

    #[test]
    fn unknown_outcomes_are_rejected() {
        let json = r#"{"runtime":1.0,"result":"MAYBE"}"#;
        assert!(serde_json::from_str::<SolverResult>(json).is_err());
    }

    #[test]
    fn non_sat_results_with_an_assignment_are_rejected() {
        let json = r#"{"assignment":{"3":["3"]},"runtime":1.0,"result":"UNSAT"}"#;
        assert!(serde_json::from_str::<SolverResult>(json).is_err());
    }

    #[test]
    fn negative_runtimes_are_rejected_or_clamped() {
        let json = r#"{"runtime":-1.0,"result":"UNSAT"}"#;
        assert!(serde_json::from_str::<SolverResult>(json).is_err());
        assert_eq!(SolverResult::unsat(-3.0).runtime(), 0.0);
    }
}
