//! The backtracking resolution engine.
//!
//! A solve works on a stack of resolve phases. Each phase repeatedly
//! EXTRACTs dependencies common to a scope's variants, INTERSECTs them with
//! the other scopes, ADDs scopes for newly referenced families and REDUCEs
//! scopes against each other, until it is solved or can act no further. An
//! exhausted phase is SPLIT around the leading candidates of one scope; the
//! remainder phase stays on the stack as the backtrack point. Phase state is
//! shared structurally (scopes hold `Arc`ed slices), so pushing a phase is
//! cheap and backtracking is a pop.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use strata_version::{Requirement, RequirementList, VersionedObject};
use tracing::debug;

use crate::fail::{
    DependencyConflict, FailureReason, SolverCallbackReturn, SolverError, SolverState,
    SolverStatus,
};
use crate::graph::ResolveGraph;
use crate::order::{PackageOrderList, VariantSelectMode};
use crate::package::PackageVariant;
use crate::provider::{PackageProvider, VariantCache};
use crate::scope::{IntersectOp, NewScope, PackageScope, ScopeOp};

/// Tunables for one solver instance.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Track which scope pairs actually need re-reduction. When false,
    /// every pair is re-checked each pass; the outcome never changes, only
    /// the speed.
    pub optimised: bool,
    /// Merge `build_requires` into each candidate's requirements.
    pub building: bool,
    /// Stop the solve once this many phases have failed, yielding an
    /// aborted (not failed) state.
    pub max_fails: Option<usize>,
    /// How variants of the same package version are prioritized.
    pub variant_mode: VariantSelectMode,
    /// Candidate ordering policies, first match wins; latest-first
    /// otherwise.
    pub orderers: PackageOrderList,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            optimised: true,
            building: false,
            max_fails: None,
            variant_mode: VariantSelectMode::default(),
            orderers: PackageOrderList::default(),
        }
    }
}

/// Everything phase operations need besides the phase itself.
pub(crate) struct SolveContext<'a> {
    pub cache: VariantCache<'a>,
    /// Non-conflict families named in the original request; feeds variant
    /// prioritization.
    pub requested_fams: BTreeSet<String>,
    pub variant_mode: VariantSelectMode,
    pub optimised: bool,
}

/// One full copy of the resolve state: a scope per implicated family plus
/// the set of scope pairs that still need reduction.
#[derive(Debug, Clone)]
struct ResolvePhase {
    scopes: Vec<PackageScope>,
    status: SolverStatus,
    failure: Option<FailureReason>,
    pending_reducts: BTreeSet<(usize, usize)>,
}

impl ResolvePhase {
    fn build(
        requests: &[Requirement],
        ctx: &mut SolveContext,
    ) -> Result<ResolvePhase, SolverError> {
        let mut scopes = Vec::with_capacity(requests.len());
        for request in requests {
            match PackageScope::new(request.clone(), &mut ctx.cache)? {
                NewScope::Scope(scope) => scopes.push(scope),
                NewScope::Fail(reason) => return Ok(ResolvePhase::failed(Vec::new(), reason)),
            }
        }
        let pending_reducts = all_pairs(scopes.len());
        Ok(ResolvePhase {
            scopes,
            status: SolverStatus::Pending,
            failure: None,
            pending_reducts,
        })
    }

    fn failed(scopes: Vec<PackageScope>, reason: FailureReason) -> ResolvePhase {
        ResolvePhase {
            scopes,
            status: SolverStatus::Failed,
            failure: Some(reason),
            pending_reducts: BTreeSet::new(),
        }
    }

    /// Run extract/intersect/add/reduce to fixpoint.
    fn solve(&self, ctx: &mut SolveContext) -> Result<ResolvePhase, SolverError> {
        if self.status != SolverStatus::Pending {
            return Ok(self.clone());
        }

        let mut scopes = self.scopes.clone();
        let mut pending = self.pending_reducts.clone();

        loop {
            loop {
                // EXTRACT: pull dependencies common to all variants of a scope
                let mut common_requests = Vec::new();
                for scope in scopes.iter_mut() {
                    while let Some((extracted, request)) = scope.extract() {
                        debug!(scope = %extracted, request = %request, "extracted");
                        *scope = extracted;
                        common_requests.push(request);
                    }
                }
                if common_requests.is_empty() {
                    break;
                }

                let request_list = RequirementList::new(&common_requests);
                if let Some((a, b)) = request_list.conflict() {
                    let conflict = DependencyConflict {
                        dependency: a.clone(),
                        conflicting_request: b.clone(),
                    };
                    debug!(conflict = %conflict, "extractions conflict");
                    return Ok(ResolvePhase::failed(
                        scopes,
                        FailureReason::Conflict(conflict),
                    ));
                }
                debug!(merged = %request_list, "merged extractions");

                // INTERSECT extractions with the existing scopes
                let mut touched_fams = BTreeSet::new();
                for i in 0..scopes.len() {
                    let Some(request) = request_list.get(scopes[i].package_name()) else {
                        continue;
                    };
                    let request = request.clone();
                    touched_fams.insert(request.name().to_string());
                    let Some(range) = request.range().cloned() else {
                        continue;
                    };
                    match scopes[i].intersect(&range, &mut ctx.cache)? {
                        IntersectOp::Unchanged => {}
                        IntersectOp::Changed(scope) => {
                            scopes[i] = scope;
                            for j in 0..scopes.len() {
                                if j != i {
                                    pending.insert((i, j));
                                }
                            }
                        }
                        IntersectOp::Empty => {
                            let conflict = DependencyConflict {
                                dependency: request,
                                conflicting_request: scopes[i].request().clone(),
                            };
                            return Ok(ResolvePhase::failed(
                                scopes,
                                FailureReason::Conflict(conflict),
                            ));
                        }
                        IntersectOp::Missing => {
                            let request =
                                Requirement::construct(scopes[i].package_name(), Some(range));
                            return Ok(ResolvePhase::failed(
                                scopes,
                                FailureReason::Exhausted { request },
                            ));
                        }
                    }
                }

                // ADD scopes for newly referenced families
                let new_requests: Vec<Requirement> = request_list
                    .requirements()
                    .iter()
                    .filter(|r| !touched_fams.contains(r.name()))
                    .cloned()
                    .collect();
                if !new_requests.is_empty() {
                    let before = scopes.len();
                    for request in new_requests {
                        match PackageScope::new(request, &mut ctx.cache)? {
                            NewScope::Scope(scope) => {
                                debug!(scope = %scope, "added scope");
                                scopes.push(scope);
                            }
                            NewScope::Fail(reason) => {
                                return Ok(ResolvePhase::failed(scopes, reason))
                            }
                        }
                    }
                    let after = scopes.len();
                    for i in before..after {
                        for j in 0..after {
                            if i != j {
                                pending.insert((i, j));
                            }
                        }
                    }
                    for i in 0..before {
                        for j in before..after {
                            pending.insert((i, j));
                        }
                    }
                }
            }

            if pending.is_empty() {
                break;
            }

            // REDUCE scopes against each other's requests
            if !ctx.optimised {
                pending = all_pairs(scopes.len());
            }
            while !pending.is_empty() {
                let mut next_pending = BTreeSet::new();
                for (i, j) in std::mem::take(&mut pending) {
                    let request = scopes[i].request().clone();
                    let (op, reductions) = scopes[j].reduce_by(&request);
                    match op {
                        ScopeOp::Unchanged => {}
                        ScopeOp::Changed(scope) => {
                            debug!(scope = %scope, by = %request, "reduced scope");
                            scopes[j] = scope;
                            for k in 0..scopes.len() {
                                if k != j {
                                    next_pending.insert((j, k));
                                }
                            }
                        }
                        ScopeOp::Empty => {
                            return Ok(ResolvePhase::failed(
                                scopes,
                                FailureReason::TotalReduction(reductions),
                            ));
                        }
                    }
                }
                pending = next_pending;
            }
        }

        let solved = scopes.iter().all(PackageScope::is_solved);
        Ok(ResolvePhase {
            scopes,
            status: if solved {
                SolverStatus::Solved
            } else {
                SolverStatus::Exhausted
            },
            failure: None,
            pending_reducts: BTreeSet::new(),
        })
    }

    /// Drop conflict scopes, detect dependency cycles, and order the solved
    /// packages dependencies-first (lexicographic otherwise).
    fn finalise(&self) -> ResolvePhase {
        let mut solved: HashMap<String, Arc<PackageVariant>> = HashMap::new();
        let mut scope_by_name: HashMap<String, PackageScope> = HashMap::new();
        for scope in &self.scopes {
            if scope.is_conflict() {
                continue;
            }
            if let Some(variant) = scope.solved_variant() {
                solved.insert(scope.package_name().to_string(), variant);
                scope_by_name.insert(scope.package_name().to_string(), scope.clone());
            }
        }

        let mut names: Vec<String> = solved.keys().cloned().collect();
        names.sort();

        let mut graph = ResolveGraph::new();
        for name in &names {
            graph.add_node(name);
            for req in solved[name].requires() {
                if !req.conflict() && solved.contains_key(req.name()) {
                    graph.add_edge(name, req.name());
                }
            }
        }

        if let Some(cycle) = graph.find_cycle() {
            let chain: Vec<VersionedObject> = cycle
                .iter()
                .map(|name| {
                    VersionedObject::construct(
                        name.clone(),
                        Some(solved[name].version().clone()),
                    )
                })
                .collect();
            debug!(cycle = ?cycle, "cyclic resolve");
            return ResolvePhase {
                scopes: self.scopes.clone(),
                status: SolverStatus::Cyclic,
                failure: Some(FailureReason::Cycle(chain)),
                pending_reducts: BTreeSet::new(),
            };
        }

        let scopes: Vec<PackageScope> = graph
            .dependency_order(&names)
            .iter()
            .filter_map(|name| scope_by_name.get(name).cloned())
            .collect();
        ResolvePhase {
            scopes,
            status: SolverStatus::Solved,
            failure: None,
            pending_reducts: BTreeSet::new(),
        }
    }

    /// Split around the splittable scope with the lexicographically
    /// smallest family name. The canonical choice keeps the resolve
    /// independent of request order.
    fn split(&self, ctx: &SolveContext) -> (ResolvePhase, ResolvePhase) {
        let mut chosen: Option<usize> = None;
        for (i, scope) in self.scopes.iter().enumerate() {
            if !scope.splittable() {
                continue;
            }
            let better = match chosen {
                None => true,
                Some(c) => scope.package_name() < self.scopes[c].package_name(),
            };
            if better {
                chosen = Some(i);
            }
        }
        let idx = chosen.expect("an exhausted phase has a splittable scope");

        let (leading, rest) = self.scopes[idx]
            .split(&ctx.requested_fams, ctx.variant_mode)
            .expect("a splittable scope splits");

        let mut pending = BTreeSet::new();
        for j in 0..self.scopes.len() {
            if j != idx {
                pending.insert((idx, j));
            }
        }

        let mut scopes = self.scopes.clone();
        scopes[idx] = leading;
        let phase = ResolvePhase {
            scopes,
            status: SolverStatus::Pending,
            failure: None,
            pending_reducts: pending.clone(),
        };

        let mut next_scopes = self.scopes.clone();
        next_scopes[idx] = rest;
        let next_phase = ResolvePhase {
            scopes: next_scopes,
            status: SolverStatus::Pending,
            failure: None,
            pending_reducts: pending,
        };

        (phase, next_phase)
    }

    fn num_open_scopes(&self) -> usize {
        self.scopes.iter().filter(|s| !s.is_solved()).count()
    }

    fn solved_variants(&self) -> Vec<Arc<PackageVariant>> {
        self.scopes
            .iter()
            .filter_map(PackageScope::solved_variant)
            .collect()
    }
}

impl fmt::Display for ResolvePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, scope) in self.scopes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{scope}")?;
        }
        Ok(())
    }
}

fn all_pairs(n: usize) -> BTreeSet<(usize, usize)> {
    let mut pairs = BTreeSet::new();
    for i in 0..n {
        for j in 0..n {
            if i != j {
                pairs.insert((i, j));
            }
        }
    }
    pairs
}

/// The result of a finished solve run.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub status: SolverStatus,
    /// The resolved candidates, required packages before their dependents;
    /// empty unless solved.
    pub packages: Vec<Arc<PackageVariant>>,
    /// The reason, if the solve failed or was stopped by the fail bound.
    pub failure: Option<FailureReason>,
    /// Total candidate trials discarded during the search.
    pub num_fails: usize,
}

/// The resolution solver.
///
/// A solver takes a list of package requests, then runs a backtracking
/// search to determine the resolve: the list of non-conflicting packages
/// that includes all dependencies. Each solver runs one resolve to
/// completion; construct a fresh solver for a fresh resolve.
pub struct Solver<'a> {
    request_list: RequirementList,
    ctx: SolveContext<'a>,
    max_fails: Option<usize>,
    callback: Option<Box<dyn FnMut(&SolverState) -> SolverCallbackReturn + 'a>>,
    phase_stack: Vec<ResolvePhase>,
    failed_phases: Vec<ResolvePhase>,
    solve_count: usize,
    solve_begun: bool,
    aborted: bool,
    too_many_fails: bool,
    callback_failed: bool,
}

impl<'a> Solver<'a> {
    /// Create a solver with default options.
    pub fn new(
        requests: Vec<Requirement>,
        provider: &'a dyn PackageProvider,
    ) -> Result<Solver<'a>, SolverError> {
        Self::with_options(requests, provider, SolverOptions::default())
    }

    pub fn with_options(
        requests: Vec<Requirement>,
        provider: &'a dyn PackageProvider,
        options: SolverOptions,
    ) -> Result<Solver<'a>, SolverError> {
        let requested_fams: BTreeSet<String> = requests
            .iter()
            .filter(|r| !r.conflict())
            .map(|r| r.name().to_string())
            .collect();

        let mut ctx = SolveContext {
            cache: VariantCache::new(provider, options.orderers, options.building),
            requested_fams,
            variant_mode: options.variant_mode,
            optimised: options.optimised,
        };

        let request_list = RequirementList::new(&requests);
        debug!(request = %request_list, "created solver");

        let initial = match request_list.conflict() {
            Some((a, b)) => {
                // the request contradicts itself; no candidate search needed
                let conflict = DependencyConflict {
                    dependency: a.clone(),
                    conflicting_request: b.clone(),
                };
                ResolvePhase::failed(Vec::new(), FailureReason::Conflict(conflict))
            }
            None => ResolvePhase::build(request_list.requirements(), &mut ctx)?,
        };

        Ok(Solver {
            request_list,
            ctx,
            max_fails: options.max_fails,
            callback: None,
            phase_stack: vec![initial],
            failed_phases: Vec::new(),
            solve_count: 0,
            solve_begun: false,
            aborted: false,
            too_many_fails: false,
            callback_failed: false,
        })
    }

    /// Install a progress callback, invoked after each solve step.
    pub fn set_callback(
        &mut self,
        callback: impl FnMut(&SolverState) -> SolverCallbackReturn + 'a,
    ) {
        self.callback = Some(Box::new(callback));
    }

    /// Current status of the solve.
    pub fn status(&self) -> SolverStatus {
        if self.aborted || self.too_many_fails {
            return SolverStatus::Aborted;
        }
        if self.callback_failed {
            return SolverStatus::Failed;
        }

        let head = match self.phase_stack.last() {
            Some(phase) => phase.status,
            None => return SolverStatus::Failed,
        };
        if head == SolverStatus::Cyclic {
            return SolverStatus::Cyclic;
        }
        if self.phase_stack.len() > 1 {
            if head == SolverStatus::Solved {
                SolverStatus::Solved
            } else {
                SolverStatus::Unsolved
            }
        } else if head == SolverStatus::Pending || head == SolverStatus::Exhausted {
            SolverStatus::Unsolved
        } else {
            head
        }
    }

    /// Number of solve steps executed, failures included.
    pub fn num_solves(&self) -> usize {
        self.solve_count
    }

    /// Number of failed phases so far.
    pub fn num_fails(&self) -> usize {
        let mut n = self.failed_phases.len();
        if let Some(phase) = self.phase_stack.last() {
            if phase.status == SolverStatus::Failed || phase.status == SolverStatus::Cyclic {
                n += 1;
            }
        }
        n
    }

    /// Run the solve to completion (or to the fail bound / a callback
    /// abort).
    pub fn solve(&mut self) -> Result<(), SolverError> {
        if self.solve_begun {
            return Err(SolverError::SolveAlreadyStarted);
        }
        while self.status() == SolverStatus::Unsolved {
            self.solve_step()?;
            if let Some(limit) = self.max_fails {
                if self.num_fails() > limit && self.status() == SolverStatus::Unsolved {
                    debug!(limit, "fail limit reached, aborting");
                    self.too_many_fails = true;
                    break;
                }
            }
            if self.status() == SolverStatus::Unsolved && !self.do_callback() {
                break;
            }
        }
        Ok(())
    }

    /// Perform a single solve step.
    pub fn solve_step(&mut self) -> Result<(), SolverError> {
        self.solve_begun = true;
        if self.status() != SolverStatus::Unsolved {
            return Ok(());
        }

        let mut phase = self.pop_phase();
        if phase.status == SolverStatus::Failed {
            debug!("discarding failed phase");
            self.failed_phases.push(phase);
            phase = self.pop_phase();
        }
        if phase.status == SolverStatus::Exhausted {
            let (head, next) = phase.split(&self.ctx);
            debug!(phase = %head, "split phase");
            self.push_phase(next);
            phase = head;
        }

        let new_phase = phase.solve(&mut self.ctx)?;
        self.solve_count += 1;

        match new_phase.status {
            SolverStatus::Failed => {
                debug!(phase = %new_phase, "phase failed to resolve");
                self.push_phase(new_phase);
            }
            SolverStatus::Solved => {
                // solved, but there may still be a dependency cycle
                let final_phase = new_phase.finalise();
                self.push_phase(final_phase);
            }
            _ => self.push_phase(new_phase),
        }
        Ok(())
    }

    /// Run the solve and collect the outcome.
    pub fn run(&mut self) -> Result<Resolution, SolverError> {
        self.solve()?;
        Ok(Resolution {
            status: self.status(),
            packages: self.resolved_packages().unwrap_or_default(),
            failure: self.failure_reason(),
            num_fails: self.num_fails(),
        })
    }

    /// The resolved candidates, or `None` unless the solve succeeded.
    pub fn resolved_packages(&self) -> Option<Vec<Arc<PackageVariant>>> {
        if self.status() != SolverStatus::Solved {
            return None;
        }
        self.phase_stack.last().map(ResolvePhase::solved_variants)
    }

    /// Why the solve failed, if it did.
    ///
    /// For a cyclic solve or a callback-nominated failure, the most recent
    /// failure is reported; otherwise the first one.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        if self.too_many_fails {
            return Some(FailureReason::TooManyFails {
                limit: self.max_fails.unwrap_or(0),
            });
        }

        let head = self.phase_stack.last();
        let head_status = head.map(|p| p.status);
        let head_failed = matches!(
            head_status,
            Some(SolverStatus::Failed) | Some(SolverStatus::Cyclic)
        );

        let mut fails: Vec<&ResolvePhase> = self.failed_phases.iter().collect();
        if head_failed {
            fails.extend(head);
        }
        if fails.is_empty() {
            return None;
        }

        let use_latest = head_status == Some(SolverStatus::Cyclic) || self.callback_failed;
        let phase = if use_latest { fails[fails.len() - 1] } else { fails[0] };
        phase.failure.clone()
    }

    /// The requirements involved in the failure, if the solve failed.
    pub fn failure_packages(&self) -> Option<Vec<Requirement>> {
        self.failure_reason()
            .map(|reason| reason.involved_requirements())
    }

    /// The merged form of the original request.
    pub fn request_list(&self) -> &RequirementList {
        &self.request_list
    }

    fn do_callback(&mut self) -> bool {
        if self.callback.is_none() {
            return true;
        }
        let open_scopes = self
            .phase_stack
            .iter()
            .rev()
            .find(|p| !p.status.is_failed())
            .map(ResolvePhase::num_open_scopes)
            .unwrap_or(0);
        let state = SolverState {
            num_solves: self.solve_count,
            num_fails: self.num_fails(),
            open_scopes,
        };

        let verdict = match self.callback.as_mut() {
            Some(callback) => callback(&state),
            None => return true,
        };
        match verdict {
            SolverCallbackReturn::KeepGoing => true,
            SolverCallbackReturn::Abort => {
                debug!("solve aborted by callback");
                self.aborted = true;
                false
            }
            SolverCallbackReturn::Fail => {
                if state.num_fails > 0 {
                    debug!("callback nominated most recent failure");
                    self.callback_failed = true;
                    false
                } else {
                    true
                }
            }
        }
    }

    fn push_phase(&mut self, phase: ResolvePhase) {
        debug!(depth = self.phase_stack.len(), phase = %phase, "pushed phase");
        self.phase_stack.push(phase);
    }

    fn pop_phase(&mut self) -> ResolvePhase {
        let phase = self
            .phase_stack
            .pop()
            .expect("the phase stack is never empty while unsolved");
        debug!(depth = self.phase_stack.len(), phase = %phase, "popped phase");
        phase
    }
}

impl fmt::Display for Solver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status())?;
        if let Some(phase) = self.phase_stack.last() {
            write!(f, " {{{}}} {}", self.phase_stack.len() - 1, phase)?;
        }
        Ok(())
    }
}
