//! Package scopes: per-family candidate slices narrowed during a resolve.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use strata_version::{Requirement, Version, VersionRange};
use tracing::debug;

use crate::fail::{FailureReason, Reduction, SolverError};
use crate::order::VariantSelectMode;
use crate::package::PackageVariant;
use crate::provider::{SliceLookup, VariantCache};

/// Outcome of narrowing a slice or scope.
pub(crate) enum ScopeOp {
    /// Nothing was removed.
    Unchanged,
    /// Some candidates were removed; here is the narrowed copy.
    Changed(PackageScope),
    /// Every candidate was removed.
    Empty,
}

/// Outcome of intersecting a scope with an extracted range.
pub(crate) enum IntersectOp {
    Unchanged,
    Changed(PackageScope),
    /// The range and the scope share no candidate.
    Empty,
    /// The scope's family does not exist at all.
    Missing,
}

/// Outcome of creating a scope for a request.
pub(crate) enum NewScope {
    Scope(PackageScope),
    Fail(FailureReason),
}

/// A subset of one family's candidate list, with dependency bookkeeping.
///
/// Slices are cheap to share; every narrowing operation returns a fresh
/// copy, leaving the original intact for phases further down the stack.
#[derive(Debug, Clone)]
pub(crate) struct VariantSlice {
    package_name: String,
    variants: Vec<Arc<PackageVariant>>,
    range: VersionRange,
    /// Families already extracted from this slice.
    extracted_fams: BTreeSet<String>,
    /// Families required by every remaining variant.
    common_fams: BTreeSet<String>,
    /// Families required (or conflicted) by any remaining variant.
    fam_requires: BTreeSet<String>,
}

enum SliceOp {
    Unchanged,
    Narrowed(VariantSlice),
    Empty,
}

impl VariantSlice {
    pub fn new(package_name: &str, variants: Vec<Arc<PackageVariant>>) -> VariantSlice {
        let mut slice = VariantSlice {
            package_name: package_name.to_string(),
            variants,
            range: VersionRange::any(),
            extracted_fams: BTreeSet::new(),
            common_fams: BTreeSet::new(),
            fam_requires: BTreeSet::new(),
        };
        slice.update();
        slice
    }

    pub fn variants(&self) -> &[Arc<PackageVariant>] {
        &self.variants
    }

    pub fn range(&self) -> &VersionRange {
        &self.range
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// True while common dependencies remain to be extracted.
    pub fn extractable(&self) -> bool {
        self.common_fams
            .difference(&self.extracted_fams)
            .next()
            .is_some()
    }

    fn update(&mut self) {
        let versions: BTreeSet<Version> =
            self.variants.iter().map(|v| v.version().clone()).collect();
        self.range =
            VersionRange::from_versions(versions).expect("a slice holds at least one variant");

        let mut common: Option<BTreeSet<String>> = None;
        let mut all = BTreeSet::new();
        for variant in &self.variants {
            let fams = variant.requires_list().names();
            all.extend(fams.iter().cloned());
            all.extend(variant.requires_list().conflict_names().iter().cloned());
            common = Some(match common {
                None => fams.clone(),
                Some(seen) => seen.intersection(fams).cloned().collect(),
            });
        }
        self.common_fams = common.unwrap_or_default();
        self.fam_requires = all;
    }

    fn copy_with(&self, variants: Vec<Arc<PackageVariant>>) -> VariantSlice {
        let mut slice = self.clone();
        slice.variants = variants;
        slice.extracted_fams.clear();
        slice.update();
        slice
    }

    /// Remove variants whose version falls outside the given range.
    fn intersect(&self, range: &VersionRange) -> SliceOp {
        if range.is_any() {
            return SliceOp::Unchanged;
        }
        let variants: Vec<Arc<PackageVariant>> = self
            .variants
            .iter()
            .filter(|v| range.contains_version(v.version()))
            .cloned()
            .collect();
        if variants.is_empty() {
            SliceOp::Empty
        } else if variants.len() < self.variants.len() {
            SliceOp::Narrowed(self.copy_with(variants))
        } else {
            SliceOp::Unchanged
        }
    }

    /// Remove variants whose dependencies conflict with the given request.
    fn reduce_by(&self, request: &Requirement) -> (SliceOp, Vec<Reduction>) {
        if request.range().is_none() || !self.fam_requires.contains(request.name()) {
            return (SliceOp::Unchanged, Vec::new());
        }

        let mut variants = Vec::new();
        let mut reductions = Vec::new();
        for variant in &self.variants {
            match variant.get(request.name()) {
                Some(dependency) if dependency.conflicts_with(request) => {
                    let reduction = Reduction {
                        name: variant.name().to_string(),
                        version: variant.version().clone(),
                        variant_index: variant.index(),
                        dependency: dependency.clone(),
                        conflicting_request: request.clone(),
                    };
                    debug!(removed = %reduction, "reduced variant");
                    reductions.push(reduction);
                }
                _ => variants.push(variant.clone()),
            }
        }

        if variants.is_empty() {
            (SliceOp::Empty, reductions)
        } else if reductions.is_empty() {
            (SliceOp::Unchanged, reductions)
        } else {
            (SliceOp::Narrowed(self.copy_with(variants)), reductions)
        }
    }

    /// Extract a dependency common to all remaining variants, as the union
    /// of their per-variant ranges. Conflict dependencies are never
    /// extracted; they are resolved via reduction instead.
    fn extract(&self) -> Option<(VariantSlice, Requirement)> {
        let fam = self
            .common_fams
            .difference(&self.extracted_fams)
            .next()?
            .clone();

        let mut range: Option<VersionRange> = None;
        for variant in &self.variants {
            if let Some(req_range) = variant.get(&fam).and_then(|r| r.range()) {
                range = Some(match range {
                    None => req_range.clone(),
                    Some(acc) => acc.union(req_range),
                });
            }
        }

        let mut slice = self.clone();
        slice.extracted_fams.insert(fam.clone());
        Some((slice, Requirement::construct(fam, range)))
    }

    /// Split off a leading group of variants that shares a common, not yet
    /// extracted dependency (worst case, the single leading variant). The
    /// remainder becomes the backtrack slice.
    fn split(
        &self,
        requested_fams: &BTreeSet<String>,
        mode: VariantSelectMode,
    ) -> Option<(VariantSlice, VariantSlice)> {
        if self.variants.len() == 1 {
            return None;
        }

        let mut sorted = self.clone();
        sorted.sort_variants(requested_fams, mode);

        let mut nleading = 1;
        if sorted.variants.len() > 2 {
            let mut fams: BTreeSet<String> = sorted.variants[0]
                .requires_list()
                .names()
                .difference(&self.extracted_fams)
                .cloned()
                .collect();
            if !fams.is_empty() {
                for (j, variant) in sorted.variants.iter().enumerate().skip(1) {
                    let next_fams: BTreeSet<String> = fams
                        .intersection(variant.requires_list().names())
                        .cloned()
                        .collect();
                    if next_fams.is_empty() {
                        nleading = j;
                        break;
                    }
                    fams = next_fams;
                }
            }
        }

        let leading = sorted.copy_with(sorted.variants[..nleading].to_vec());
        let rest = sorted.copy_with(sorted.variants[nleading..].to_vec());
        debug!(slice = %self, leading = %leading, rest = %rest, "split slice");
        Some((leading, rest))
    }

    /// Order variants of equal version from most to least preferable.
    ///
    /// The key is independent of request order, so variant selection is
    /// repeatable for permuted input: requirement ranges of families shared
    /// with the request (keyed by name), then the fewest additional
    /// families, then their highest ranges, then the variant index.
    fn sort_variants(&mut self, requested_fams: &BTreeSet<String>, mode: VariantSelectMode) {
        let mut sorted: Vec<Arc<PackageVariant>> = Vec::with_capacity(self.variants.len());
        let mut i = 0;
        while i < self.variants.len() {
            let mut j = i + 1;
            while j < self.variants.len()
                && self.variants[j].version() == self.variants[i].version()
            {
                j += 1;
            }
            if j - i > 1 {
                let mut group = self.variants[i..j].to_vec();
                group.sort_by_cached_key(|v| Reverse(Self::variant_key(v, requested_fams, mode)));
                sorted.extend(group);
            } else {
                sorted.push(self.variants[i].clone());
            }
            i = j;
        }
        self.variants = sorted;
    }

    #[allow(clippy::type_complexity)]
    fn variant_key(
        variant: &PackageVariant,
        requested_fams: &BTreeSet<String>,
        mode: VariantSelectMode,
    ) -> (
        usize,
        Vec<(String, VersionRange)>,
        Reverse<usize>,
        Vec<(VersionRange, String)>,
        Reverse<usize>,
    ) {
        let mut requested = Vec::new();
        let mut additional = Vec::new();
        for req in variant.requires() {
            if req.conflict() {
                continue;
            }
            let Some(range) = req.range() else { continue };
            if requested_fams.contains(req.name()) {
                requested.push((req.name().to_string(), range.clone()));
            } else {
                additional.push((range.clone(), req.name().to_string()));
            }
        }
        requested.sort();
        additional.sort();

        let lead = match mode {
            VariantSelectMode::VersionPriority => 0,
            VariantSelectMode::IntersectionPriority => requested.len(),
        };
        (
            lead,
            requested,
            Reverse(additional.len()),
            additional,
            Reverse(variant.index().unwrap_or(0)),
        )
    }
}

impl fmt::Display for VariantSlice {
    /// `foo[2..6(3:4)]*` reads: 3 versions, 4 variants within `2..6`, and at
    /// least one family can still be extracted. `[foo==2[1,2]]` reads: 1st
    /// and 2nd variants of exact version `foo-2`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variants.len() == 1 {
            let variant = &self.variants[0];
            write!(f, "[{}=={}", self.package_name, variant.version())?;
            if let Some(index) = variant.index() {
                write!(f, "[{index}]")?;
            }
            write!(f, "]")?;
        } else {
            let versions: BTreeSet<&Version> =
                self.variants.iter().map(|v| v.version()).collect();
            if versions.len() == 1 {
                let indexes: Vec<String> = self
                    .variants
                    .iter()
                    .map(|v| match v.index() {
                        Some(index) => index.to_string(),
                        None => String::new(),
                    })
                    .collect();
                write!(
                    f,
                    "[{}=={}[{}]]",
                    self.package_name,
                    self.variants[0].version(),
                    indexes.join(",")
                )?;
            } else {
                let counts = if versions.len() == self.variants.len() {
                    format!("{}", self.variants.len())
                } else {
                    format!("{}:{}", versions.len(), self.variants.len())
                };
                write!(f, "{}[{}({})]", self.package_name, self.range.span(), counts)?;
            }
        }
        if self.extractable() {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// The solver's view of one package family: its effective request and, for
/// non-conflict requests, the slice of candidates still in play.
#[derive(Debug, Clone)]
pub(crate) struct PackageScope {
    package_name: String,
    request: Requirement,
    slice: Option<Arc<VariantSlice>>,
}

impl PackageScope {
    pub fn new(request: Requirement, cache: &mut VariantCache) -> Result<NewScope, SolverError> {
        if request.conflict() {
            return Ok(NewScope::Scope(PackageScope {
                package_name: request.name().to_string(),
                request,
                slice: None,
            }));
        }

        let range = request.range().cloned().unwrap_or_else(VersionRange::any);
        match cache.variant_slice(request.name(), &range)? {
            SliceLookup::Slice(slice) => {
                let mut scope = PackageScope {
                    package_name: request.name().to_string(),
                    request,
                    slice: Some(Arc::new(slice)),
                };
                scope.update_request();
                Ok(NewScope::Scope(scope))
            }
            SliceLookup::FamilyMissing | SliceLookup::NoneInRange => {
                Ok(NewScope::Fail(FailureReason::Exhausted { request }))
            }
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn request(&self) -> &Requirement {
        &self.request
    }

    pub fn is_conflict(&self) -> bool {
        self.request.conflict()
    }

    /// True once this scope pins a single candidate with nothing left to
    /// extract. Conflict scopes are trivially solved; they assert an
    /// absence, not a candidate.
    pub fn is_solved(&self) -> bool {
        match &self.slice {
            None => true,
            Some(slice) => slice.len() == 1 && !slice.extractable(),
        }
    }

    pub fn splittable(&self) -> bool {
        self.slice.as_ref().is_some_and(|s| s.len() > 1)
    }

    pub fn solved_variant(&self) -> Option<Arc<PackageVariant>> {
        let slice = self.slice.as_ref()?;
        if slice.len() == 1 && !slice.extractable() {
            Some(slice.variants()[0].clone())
        } else {
            None
        }
    }

    fn update_request(&mut self) {
        if let Some(slice) = &self.slice {
            self.request =
                Requirement::construct(self.package_name.clone(), Some(slice.range().clone()));
        }
    }

    fn with_slice(&self, slice: VariantSlice) -> PackageScope {
        let mut scope = self.clone();
        scope.slice = Some(Arc::new(slice));
        scope.update_request();
        scope
    }

    /// Intersect this scope with an extracted package range.
    ///
    /// A conflict scope hit by a positive range materializes into a regular
    /// scope over whatever the conflict leaves of that range.
    pub fn intersect(
        &self,
        range: &VersionRange,
        cache: &mut VariantCache,
    ) -> Result<IntersectOp, SolverError> {
        if self.request.conflict() {
            let lookup = match self.request.range() {
                None => cache.variant_slice(&self.package_name, range)?,
                Some(conflict_range) => match range.subtract(conflict_range) {
                    Some(remaining) => cache.variant_slice(&self.package_name, &remaining)?,
                    None => SliceLookup::NoneInRange,
                },
            };
            return Ok(match lookup {
                SliceLookup::Slice(slice) => {
                    let scope = self.with_slice(slice);
                    debug!(scope = %scope, range = %range, "conflict scope materialized");
                    IntersectOp::Changed(scope)
                }
                SliceLookup::NoneInRange => IntersectOp::Empty,
                SliceLookup::FamilyMissing => IntersectOp::Missing,
            });
        }

        let slice = self.slice.as_ref().expect("non-conflict scope has a slice");
        Ok(match slice.intersect(range) {
            SliceOp::Unchanged => IntersectOp::Unchanged,
            SliceOp::Narrowed(narrowed) => {
                let scope = self.with_slice(narrowed);
                debug!(scope = %scope, range = %range, "scope intersected");
                IntersectOp::Changed(scope)
            }
            SliceOp::Empty => IntersectOp::Empty,
        })
    }

    /// Reduce this scope against another scope's request.
    pub fn reduce_by(&self, request: &Requirement) -> (ScopeOp, Vec<Reduction>) {
        let Some(slice) = &self.slice else {
            return (ScopeOp::Unchanged, Vec::new());
        };
        match slice.reduce_by(request) {
            (SliceOp::Unchanged, reductions) => (ScopeOp::Unchanged, reductions),
            (SliceOp::Narrowed(narrowed), reductions) => {
                (ScopeOp::Changed(self.with_slice(narrowed)), reductions)
            }
            (SliceOp::Empty, reductions) => (ScopeOp::Empty, reductions),
        }
    }

    /// Extract a common dependency, if one remains.
    pub fn extract(&self) -> Option<(PackageScope, Requirement)> {
        let slice = self.slice.as_ref()?;
        let (new_slice, request) = slice.extract()?;
        let mut scope = self.clone();
        scope.slice = Some(Arc::new(new_slice));
        Some((scope, request))
    }

    /// Split the scope around its leading candidate group.
    pub fn split(
        &self,
        requested_fams: &BTreeSet<String>,
        mode: VariantSelectMode,
    ) -> Option<(PackageScope, PackageScope)> {
        let slice = self.slice.as_ref()?;
        let (leading, rest) = slice.split(requested_fams, mode)?;
        Some((self.with_slice(leading), self.with_slice(rest)))
    }
}

impl fmt::Display for PackageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slice {
            Some(slice) => write!(f, "{slice}"),
            None => write!(f, "{}", self.request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageVariant;

    fn variant(object: &str, index: Option<usize>, requires: &[&str]) -> Arc<PackageVariant> {
        let object = strata_version::VersionedObject::parse(object).unwrap();
        let requires: Vec<Requirement> = requires
            .iter()
            .map(|s| Requirement::parse(s).unwrap())
            .collect();
        Arc::new(
            PackageVariant::new(object.name(), object.version().clone(), index, &requires)
                .unwrap(),
        )
    }

    fn slice(variants: Vec<Arc<PackageVariant>>) -> VariantSlice {
        let name = variants[0].name().to_string();
        VariantSlice::new(&name, variants)
    }

    #[test]
    fn extraction_unions_common_ranges() {
        let s = slice(vec![
            variant("pybah-5", None, &["python-2.5"]),
            variant("pybah-4", None, &["python-2.6"]),
        ]);
        assert!(s.extractable());
        let (extracted, request) = s.extract().unwrap();
        assert_eq!(request, Requirement::parse("python-2.5|2.6").unwrap());
        assert!(!extracted.extractable());
        assert!(extracted.extract().is_none());
    }

    #[test]
    fn conflict_dependencies_are_never_extracted() {
        let s = slice(vec![variant("nopy-2.1", None, &["~python-2.7+"])]);
        assert!(!s.extractable());
        assert!(s.extract().is_none());
    }

    #[test]
    fn reduction_removes_conflicting_variants() {
        let s = slice(vec![
            variant("pybah-5", None, &["python-2.5"]),
            variant("pybah-4", None, &["python-2.6"]),
        ]);
        let request = Requirement::parse("python-2.6.8").unwrap();
        let (op, reductions) = s.reduce_by(&request);
        let SliceOp::Narrowed(narrowed) = op else {
            panic!("expected a narrowed slice");
        };
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed.variants()[0].version().to_string(), "4");
        assert_eq!(reductions.len(), 1);
        assert_eq!(reductions[0].version.to_string(), "5");
    }

    #[test]
    fn reduction_ignores_unrelated_requests() {
        let s = slice(vec![variant("pybah-5", None, &["python-2.5"])]);
        let request = Requirement::parse("ruby-3").unwrap();
        let (op, reductions) = s.reduce_by(&request);
        assert!(matches!(op, SliceOp::Unchanged));
        assert!(reductions.is_empty());
    }

    #[test]
    fn variant_sort_is_deterministic() {
        let requested: BTreeSet<String> = BTreeSet::new();
        // both variants of the same version; the one requiring the higher
        // additional package sorts first under version priority
        let mut s = slice(vec![
            variant("multi-1.1", Some(0), &["python-2.6"]),
            variant("multi-1.1", Some(1), &["python-2.7"]),
        ]);
        s.sort_variants(&requested, VariantSelectMode::VersionPriority);
        assert_eq!(s.variants()[0].index(), Some(1));
        assert_eq!(s.variants()[1].index(), Some(0));

        // equal keys fall back to ascending variant index
        let mut s = slice(vec![
            variant("multi-1.1", Some(1), &["python-2.6"]),
            variant("multi-1.1", Some(0), &["python-2.6"]),
        ]);
        s.sort_variants(&requested, VariantSelectMode::VersionPriority);
        assert_eq!(s.variants()[0].index(), Some(0));
    }

    #[test]
    fn split_groups_leading_common_dependencies() {
        let s = slice(vec![
            variant("pysplit-7", None, &["python-2.6+"]),
            variant("pysplit-6", None, &["python-2.6+"]),
            variant("pysplit-5", None, &[]),
        ]);
        let (leading, rest) = s.split(&BTreeSet::new(), VariantSelectMode::VersionPriority).unwrap();
        assert_eq!(leading.len(), 2);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.variants()[0].version().to_string(), "5");
    }

    #[test]
    fn slice_display_forms() {
        let s = slice(vec![variant("foo-2", None, &[])]);
        assert_eq!(s.to_string(), "[foo==2]");

        let s = slice(vec![
            variant("foo-2", Some(1), &[]),
            variant("foo-2", Some(2), &[]),
        ]);
        assert_eq!(s.to_string(), "[foo==2[1,2]]");

        let s = slice(vec![
            variant("foo-6", None, &["bar"]),
            variant("foo-2", None, &["bar"]),
        ]);
        // two versions spanning 2..6, with 'bar' still extractable
        assert_eq!(s.to_string(), "foo[2..6(2)]*");
    }
}
