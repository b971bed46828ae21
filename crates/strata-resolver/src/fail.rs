//! Solver status, failure diagnosis and callbacks.

use std::fmt;

use miette::Diagnostic;
use strata_version::{Requirement, Version, VersionRange, VersionedObject};
use thiserror::Error;

/// Hard errors that abort a solve outright.
///
/// Everything else the solver reports — conflicts, cycles, missing
/// candidates — is *data* attached to a failed resolve, not an error.
#[derive(Debug, Error, Diagnostic)]
pub enum SolverError {
    /// A provider supplied a package whose own requirements contradict each
    /// other.
    #[error("package {package} has an internal requirements conflict: {conflict}")]
    InvalidPackage { package: String, conflict: String },

    /// `solve()` was called on a solver that has already run.
    #[error("cannot run solve() on a solve that has already been started")]
    SolveAlreadyStarted,
}

/// State of a solver or of a single resolve phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// The solve has not yet started.
    Pending,
    /// The solve has started, but is not yet solved.
    Unsolved,
    /// The solve has completed successfully.
    Solved,
    /// The current phase can act no further and must be split to continue.
    Exhausted,
    /// The solve is not possible.
    Failed,
    /// The solve contains a cyclic dependency.
    Cyclic,
    /// The solve was stopped before completion, by a callback or a fail
    /// limit; this is a partial state, not a definitive failure.
    Aborted,
}

impl SolverStatus {
    /// True for the terminal no-solution states (`Cyclic` is a
    /// specialization of `Failed`).
    pub fn is_failed(&self) -> bool {
        matches!(self, SolverStatus::Failed | SolverStatus::Cyclic)
    }

    /// Human readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            SolverStatus::Pending => "the solve has not yet started",
            SolverStatus::Unsolved => "the solve has started, but is not yet solved",
            SolverStatus::Solved => "the solve has completed successfully",
            SolverStatus::Exhausted => {
                "the current solve is exhausted and must be split to continue further"
            }
            SolverStatus::Failed => "the solve is not possible",
            SolverStatus::Cyclic => "the solve contains a cycle",
            SolverStatus::Aborted => "the solve was stopped before completion",
        }
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverStatus::Pending => "pending",
            SolverStatus::Unsolved => "unsolved",
            SolverStatus::Solved => "solved",
            SolverStatus::Exhausted => "exhausted",
            SolverStatus::Failed => "failed",
            SolverStatus::Cyclic => "cyclic",
            SolverStatus::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Verdict returned by the progress callback after each solve step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverCallbackReturn {
    /// Continue the solve.
    KeepGoing,
    /// Stop the solve and mark it aborted.
    Abort,
    /// Stop the solve and accept the most recent failure as the result;
    /// ignored if nothing has failed yet.
    Fail,
}

/// Snapshot of solver progress handed to the callback.
#[derive(Debug, Clone, Copy)]
pub struct SolverState {
    /// Solve steps executed so far, failures included.
    pub num_solves: usize,
    /// Failed phases so far.
    pub num_fails: usize,
    /// Scopes still open in the latest non-failed phase.
    pub open_scopes: usize,
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "solve #{} ({} fails so far): {} open scopes",
            self.num_solves, self.num_fails, self.open_scopes
        )
    }
}

/// Two requirements that cannot hold at the same time.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyConflict {
    /// The requirement being introduced (e.g. a merged dependency of a set
    /// of variants).
    pub dependency: Requirement,
    /// The request it clashed with.
    pub conflicting_request: Requirement,
}

impl fmt::Display for DependencyConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <--!--> {}", self.dependency, self.conflicting_request)
    }
}

/// A candidate variant removed because one of its dependencies conflicted
/// with another scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub name: String,
    pub version: Version,
    pub variant_index: Option<usize>,
    pub dependency: Requirement,
    pub conflicting_request: Requirement,
}

impl Reduction {
    /// The removed candidate as `name-version[index]`.
    pub fn reducee(&self) -> String {
        let object = VersionedObject::construct(self.name.clone(), Some(self.version.clone()));
        match self.variant_index {
            Some(index) => format!("{object}[{index}]"),
            None => format!("{object}[]"),
        }
    }

    /// The requirements involved in this reduction.
    pub fn involved_requirements(&self) -> Vec<Requirement> {
        let range = VersionRange::from_version(self.version.clone());
        vec![
            Requirement::construct(self.name.clone(), Some(range)),
            self.dependency.clone(),
            self.conflicting_request.clone(),
        ]
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} --> {} <--!--> {}",
            self.reducee(),
            self.dependency,
            self.conflicting_request
        )
    }
}

/// Why a resolve failed. Exactly one reason is attached to a failed solve.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// Two requirements cannot be satisfied together.
    Conflict(DependencyConflict),
    /// Every candidate of a scope was removed by reduction.
    TotalReduction(Vec<Reduction>),
    /// The resolved packages are mutually dependent; the chain lists the
    /// packages forming the cycle in order.
    Cycle(Vec<VersionedObject>),
    /// No candidate exists at all for a requested name/range. Unlike a
    /// conflict, no competing requirement is to blame.
    Exhausted { request: Requirement },
    /// The configured fail bound was hit before the search finished.
    TooManyFails { limit: usize },
}

impl FailureReason {
    /// Human readable description of the failure.
    pub fn description(&self) -> String {
        match self {
            FailureReason::Conflict(_) => {
                format!("the following package conflict occurred: {self}")
            }
            FailureReason::TotalReduction(_) => {
                format!("a package was completely reduced: {self}")
            }
            FailureReason::Cycle(_) => format!("a cyclic dependency was detected: {self}"),
            FailureReason::Exhausted { request } => {
                format!("package could not be found: {request}")
            }
            FailureReason::TooManyFails { limit } => {
                format!("fail limit reached: {limit}")
            }
        }
    }

    /// The requirements involved in the failure.
    pub fn involved_requirements(&self) -> Vec<Requirement> {
        match self {
            FailureReason::Conflict(conflict) => vec![
                conflict.dependency.clone(),
                conflict.conflicting_request.clone(),
            ],
            FailureReason::TotalReduction(reductions) => reductions
                .iter()
                .flat_map(Reduction::involved_requirements)
                .collect(),
            FailureReason::Cycle(chain) => chain
                .iter()
                .map(|object| {
                    let range = VersionRange::from_version(object.version().clone());
                    Requirement::construct(object.name().to_string(), Some(range))
                })
                .collect(),
            FailureReason::Exhausted { request } => vec![request.clone()],
            FailureReason::TooManyFails { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Conflict(conflict) => write!(f, "{conflict}"),
            FailureReason::TotalReduction(reductions) => {
                for (i, reduction) in reductions.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "({reduction})")?;
                }
                Ok(())
            }
            FailureReason::Cycle(chain) => {
                for object in chain {
                    write!(f, "{object} --> ")?;
                }
                match chain.first() {
                    Some(first) => write!(f, "{first}"),
                    None => Ok(()),
                }
            }
            FailureReason::Exhausted { request } => write!(f, "{request} (no such package)"),
            FailureReason::TooManyFails { limit } => write!(f, "fail limit {limit} reached"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_version::Version;

    fn req(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    #[test]
    fn conflict_display() {
        let conflict = DependencyConflict {
            dependency: req("python-2.6"),
            conflicting_request: req("!python-2.6.8"),
        };
        assert_eq!(conflict.to_string(), "python-2.6 <--!--> !python-2.6.8");
    }

    #[test]
    fn reduction_display() {
        let reduction = Reduction {
            name: "pybah".to_string(),
            version: Version::parse("5").unwrap(),
            variant_index: None,
            dependency: req("python-2.5"),
            conflicting_request: req("python-2.6"),
        };
        assert_eq!(
            reduction.to_string(),
            "pybah-5[] --> python-2.5 <--!--> python-2.6"
        );
        assert_eq!(reduction.involved_requirements().len(), 3);
    }

    #[test]
    fn cycle_display_closes_the_loop() {
        let chain = vec![
            VersionedObject::parse("pymum-1").unwrap(),
            VersionedObject::parse("pydad-1").unwrap(),
        ];
        let reason = FailureReason::Cycle(chain);
        assert_eq!(reason.to_string(), "pymum-1 --> pydad-1 --> pymum-1");
        assert_eq!(reason.involved_requirements().len(), 2);
    }

    #[test]
    fn status_predicates() {
        assert!(SolverStatus::Failed.is_failed());
        assert!(SolverStatus::Cyclic.is_failed());
        assert!(!SolverStatus::Aborted.is_failed());
        assert!(!SolverStatus::Solved.is_failed());
        assert_eq!(SolverStatus::Solved.to_string(), "solved");
    }
}
