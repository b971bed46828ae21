//! Candidate ordering policies.
//!
//! An orderer turns the unordered candidate list of one package family into
//! a deterministic trial order for the solver. Every strategy is a total
//! order, so resolves are reproducible for identical input across runs. The
//! whole model derives serde, so an orderer configuration round-trips
//! through JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_version::{Version, VersionRange};

use crate::package::Package;

/// How the solver chooses among variants of the same package version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantSelectMode {
    /// Prefer variants requiring the highest versions of requested
    /// packages, then the fewest and highest additional packages.
    #[default]
    VersionPriority,
    /// Prefer variants sharing the most package families with the request
    /// (the most "reinforced" variant), then order as `VersionPriority`.
    IntersectionPriority,
}

/// A single candidate ordering strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PackageOrder {
    /// Highest version first. This is the default policy.
    Latest,

    /// Keep the incoming (version-descending) order untouched; useful as a
    /// per-family override.
    NoOrder,

    /// Version-sorted in either direction.
    Sorted { descending: bool },

    /// Versions up to and including `first_version` first (descending),
    /// newer ones after. Given versions `[5, 4, 3, 2, 1]` and
    /// `first_version = 3`, the order is `[3, 2, 1, 5, 4]`.
    VersionSplit { first_version: Version },

    /// Prefer packages released at or before `timestamp`, in descending
    /// order; later releases are demoted and consumed oldest-first, except
    /// that version changes within `rank` leading tokens are still taken
    /// over the timestamp (so newer patches of the last in-time release
    /// stay preferred).
    SoftTimestamp {
        timestamp: i64,
        #[serde(default)]
        rank: usize,
    },

    /// Dispatch to a different orderer per package family, with an optional
    /// fallback for unlisted families.
    PerFamily {
        orderers: BTreeMap<String, PackageOrder>,
        #[serde(default)]
        default_order: Option<Box<PackageOrder>>,
    },

    /// Explicit priority list: packages matching an earlier range pattern
    /// sort first. A pattern like `"2.6"` pulls every matching version to
    /// the front as a version-descending block; non-matching versions come
    /// last.
    Custom { version_orderings: Vec<VersionRange> },
}

impl PackageOrder {
    /// Reorder one family's candidates, or `None` if this strategy does not
    /// apply to them (the next orderer in a [`PackageOrderList`] then gets
    /// its chance).
    pub fn reorder(&self, packages: &[Package]) -> Option<Vec<Package>> {
        match self {
            PackageOrder::Latest => {
                let mut sorted = packages.to_vec();
                sorted.sort_by(|a, b| b.version.cmp(&a.version));
                Some(sorted)
            }
            PackageOrder::NoOrder => Some(packages.to_vec()),
            PackageOrder::Sorted { descending } => {
                let mut sorted = packages.to_vec();
                if *descending {
                    sorted.sort_by(|a, b| b.version.cmp(&a.version));
                } else {
                    sorted.sort_by(|a, b| a.version.cmp(&b.version));
                }
                Some(sorted)
            }
            PackageOrder::VersionSplit { first_version } => {
                Some(Self::version_split(packages, first_version))
            }
            PackageOrder::SoftTimestamp { timestamp, rank } => {
                Self::soft_timestamp(packages, *timestamp, *rank)
            }
            PackageOrder::PerFamily {
                orderers,
                default_order,
            } => {
                let family = &packages.first()?.name;
                let orderer = orderers
                    .get(family)
                    .or_else(|| default_order.as_deref())?;
                orderer.reorder(packages)
            }
            PackageOrder::Custom { version_orderings } => {
                let mut sorted = packages.to_vec();
                let position = |p: &Package| {
                    version_orderings
                        .iter()
                        .position(|r| r.contains_version(&p.version))
                        .unwrap_or(usize::MAX)
                };
                sorted.sort_by(|a, b| {
                    position(a)
                        .cmp(&position(b))
                        .then_with(|| b.version.cmp(&a.version))
                });
                Some(sorted)
            }
        }
    }

    fn version_split(packages: &[Package], first_version: &Version) -> Vec<Package> {
        let mut descending = packages.to_vec();
        descending.sort_by(|a, b| b.version.cmp(&a.version));

        let mut above = Vec::new();
        let mut below = Vec::new();
        for package in descending {
            if package.version > *first_version {
                above.push(package);
            } else {
                below.push(package);
            }
        }
        below.extend(above);
        below
    }

    fn soft_timestamp(packages: &[Package], timestamp: i64, rank: usize) -> Option<Vec<Package>> {
        let mut descending = packages.to_vec();
        descending.sort_by(|a, b| b.version.cmp(&a.version));

        let mut first_after = None;
        for (i, package) in descending.iter().enumerate() {
            if let Some(released) = package.timestamp {
                if released > timestamp {
                    first_after = Some(i);
                } else {
                    break;
                }
            }
        }
        // all packages are in time; the plain descending order stands
        let first_after = first_after?;

        let mut before: Vec<Package> = descending[first_after + 1..].to_vec();
        let mut after: Vec<Package> = descending[..=first_after].iter().rev().cloned().collect();

        if rank == 0 {
            before.extend(after);
            return Some(before);
        }

        // let newer releases through while they stay within rank of the
        // last in-time release
        if !before.is_empty() && !after.is_empty() {
            let first_prerank = before[0].version.trim(rank - 1);
            let cut = after
                .iter()
                .position(|p| p.version.trim(rank - 1) != first_prerank);
            let Some(cut) = cut else {
                // even the highest version is within rank
                return Some(descending);
            };
            if cut > 0 {
                let mut moved: Vec<Package> = after[..cut].iter().rev().cloned().collect();
                moved.extend(before);
                before = moved;
                after = after[cut..].to_vec();
            }
        }

        // ascend below rank, but descend within it
        let mut reordered: Vec<Package> = Vec::with_capacity(after.len());
        let mut within_rank: Vec<Package> = Vec::new();
        let mut prerank: Option<Version> = None;
        for package in after {
            let p = package.version.trim(rank.saturating_sub(1));
            if prerank.as_ref() == Some(&p) {
                within_rank.push(package);
            } else {
                reordered.extend(within_rank.drain(..).rev());
                within_rank.push(package);
                prerank = Some(p);
            }
        }
        reordered.extend(within_rank.into_iter().rev());

        before.extend(reordered);
        Some(before)
    }
}

/// A prioritized list of orderers: the first strategy that applies to a
/// family wins, with latest-first as the final fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageOrderList(pub Vec<PackageOrder>);

impl PackageOrderList {
    pub fn new(orderers: Vec<PackageOrder>) -> PackageOrderList {
        PackageOrderList(orderers)
    }

    /// Order one family's candidates.
    pub fn order(&self, packages: Vec<Package>) -> Vec<Package> {
        for orderer in &self.0 {
            if let Some(ordered) = orderer.reorder(&packages) {
                return ordered;
            }
        }
        PackageOrder::Latest.reorder(&packages).unwrap_or(packages)
    }
}
