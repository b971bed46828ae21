//! Dependency resolution engine.
//!
//! A [`Solver`] takes a list of package requests and produces the "resolve":
//! a consistent set of exact package+variant selections satisfying every
//! direct and transitive requirement, every exclusion and every variant
//! constraint. Candidates come from a [`PackageProvider`]; trial order is a
//! pluggable [`PackageOrder`] policy.
//!
//! The search works on a stack of *phases*. A phase holds one *scope* per
//! package family and repeatedly extracts common dependencies, intersects
//! them with other scopes, and reduces scopes against each other until it is
//! either solved or can act no further. An exhausted phase is split around
//! one scope's leading candidates, giving the trial phase and the backtrack
//! phase; failed phases simply pop off the stack. A failed resolve is a
//! normal result carrying a single [`FailureReason`], never a panic or an
//! `Err`.

pub mod fail;
pub mod order;
pub mod package;
pub mod provider;
pub mod solver;

mod graph;
mod scope;

pub use fail::{
    DependencyConflict, FailureReason, Reduction, SolverCallbackReturn, SolverError, SolverState,
    SolverStatus,
};
pub use order::{PackageOrder, PackageOrderList, VariantSelectMode};
pub use package::{Package, PackageVariant, Variant};
pub use provider::{MemoryRepository, PackageProvider};
pub use solver::{Resolution, Solver, SolverOptions};
