//! Candidate ordering policies driving the solver's trial order.

use std::collections::BTreeMap;

use strata_resolver::{
    MemoryRepository, PackageOrder, PackageOrderList, Solver, SolverOptions, SolverStatus,
};
use strata_version::{Requirement, Version, VersionRange};

fn repository() -> MemoryRepository {
    let mut repo = MemoryRepository::new();
    repo.add_at("python-2.5.2", 100, &[]).unwrap();
    repo.add_at("python-2.6.0", 200, &[]).unwrap();
    repo.add_at("python-2.6.8", 300, &[]).unwrap();
    repo.add_at("python-2.7.0", 400, &[]).unwrap();
    repo.add("pybah-4", &["python-2.6"]).unwrap();
    repo.add("pybah-5", &["python-2.5"]).unwrap();
    repo
}

fn solve_with(repo: &MemoryRepository, orderers: PackageOrderList, requests: &[&str]) -> Vec<String> {
    let requests: Vec<Requirement> = requests
        .iter()
        .map(|s| Requirement::parse(s).unwrap())
        .collect();
    let options = SolverOptions {
        orderers,
        ..SolverOptions::default()
    };
    let mut solver = Solver::with_options(requests, repo, options).unwrap();
    let resolution = solver.run().unwrap();
    assert_eq!(resolution.status, SolverStatus::Solved, "{:?}", resolution.failure);
    resolution.packages.iter().map(|p| p.to_string()).collect()
}

#[test]
fn default_order_takes_the_latest() {
    let repo = repository();
    let resolved = solve_with(&repo, PackageOrderList::default(), &["python"]);
    assert_eq!(resolved, ["python-2.7.0"]);
}

#[test]
fn soft_timestamp_resolves_as_of_a_point_in_time() {
    let repo = repository();
    let orderers = PackageOrderList(vec![PackageOrder::SoftTimestamp {
        timestamp: 250,
        rank: 0,
    }]);
    let resolved = solve_with(&repo, orderers, &["python"]);
    assert_eq!(resolved, ["python-2.6.0"]);
}

#[test]
fn version_split_prefers_the_older_side() {
    let repo = repository();
    let orderers = PackageOrderList(vec![PackageOrder::VersionSplit {
        first_version: Version::parse("2.6.0").unwrap(),
    }]);
    let resolved = solve_with(&repo, orderers, &["python"]);
    assert_eq!(resolved, ["python-2.6.0"]);
}

#[test]
fn custom_patterns_take_priority() {
    let repo = repository();
    let orderers = PackageOrderList(vec![PackageOrder::Custom {
        version_orderings: vec![VersionRange::parse("2.6").unwrap()],
    }]);
    let resolved = solve_with(&repo, orderers, &["python"]);
    assert_eq!(resolved, ["python-2.6.8"]);
}

#[test]
fn per_family_orderers_apply_to_their_family_only() {
    let repo = repository();
    let orderers = PackageOrderList(vec![PackageOrder::PerFamily {
        orderers: BTreeMap::from([(
            "python".to_string(),
            PackageOrder::Sorted { descending: false },
        )]),
        default_order: None,
    }]);

    // python is consumed oldest-first under the override
    let resolved = solve_with(&repo, orderers.clone(), &["python"]);
    assert_eq!(resolved, ["python-2.5.2"]);

    // unlisted families fall through to latest-first
    let resolved = solve_with(&repo, orderers, &["pybah"]);
    assert_eq!(resolved, ["python-2.5.2", "pybah-5"]);
}

#[test]
fn narrowing_still_applies_within_a_custom_order() {
    let repo = repository();
    let orderers = PackageOrderList(vec![PackageOrder::Sorted { descending: false }]);
    // ascending order, but the request range still rules candidates out
    let resolved = solve_with(&repo, orderers, &["python-2.6"]);
    assert_eq!(resolved, ["python-2.6.0"]);
}
