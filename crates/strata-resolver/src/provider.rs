//! Package providers and the per-resolve variant cache.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use strata_version::{Requirement, VersionError, VersionRange, VersionedObject};
use tracing::trace;

use crate::fail::SolverError;
use crate::order::PackageOrderList;
use crate::package::{Package, PackageVariant, Variant};
use crate::scope::VariantSlice;

/// Source of candidate packages for the solver.
///
/// The solver performs no storage access of its own; all candidate lookups
/// go through this interface. Implementations must present a stable,
/// order-stable snapshot for the duration of one resolve.
pub trait PackageProvider {
    /// Candidate packages of a family, optionally narrowed to a range.
    fn iter_packages(&self, name: &str, range: Option<&VersionRange>) -> Vec<Package>;

    /// The variants of a package, in variant-index order. A package without
    /// variants yields a single index-less variant.
    fn iter_variants(&self, package: &Package) -> Vec<Variant> {
        if package.variants.is_empty() {
            vec![Variant {
                index: None,
                requires: Vec::new(),
            }]
        } else {
            package
                .variants
                .iter()
                .enumerate()
                .map(|(index, requires)| Variant {
                    index: Some(index),
                    requires: requires.clone(),
                })
                .collect()
        }
    }
}

/// A simple in-memory provider: the reference implementation of the
/// provider contract, and the backing store for solver tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    families: HashMap<String, Vec<Package>>,
}

impl MemoryRepository {
    pub fn new() -> MemoryRepository {
        MemoryRepository::default()
    }

    /// Add a package described by an object string and requirement strings,
    /// e.g. `add("python-2.6.8", &[])`.
    pub fn add(&mut self, object: &str, requires: &[&str]) -> Result<(), VersionError> {
        let package = Self::build(object, requires)?;
        self.add_package(package);
        Ok(())
    }

    /// Like [`add`], with a release timestamp.
    ///
    /// [`add`]: MemoryRepository::add
    pub fn add_at(
        &mut self,
        object: &str,
        timestamp: i64,
        requires: &[&str],
    ) -> Result<(), VersionError> {
        let mut package = Self::build(object, requires)?;
        package.timestamp = Some(timestamp);
        self.add_package(package);
        Ok(())
    }

    /// Like [`add`], with a variant build matrix.
    ///
    /// [`add`]: MemoryRepository::add
    pub fn add_with_variants(
        &mut self,
        object: &str,
        requires: &[&str],
        variants: &[&[&str]],
    ) -> Result<(), VersionError> {
        let mut package = Self::build(object, requires)?;
        for variant in variants {
            package.variants.push(Self::parse_requires(variant)?);
        }
        self.add_package(package);
        Ok(())
    }

    /// Add a fully built package.
    pub fn add_package(&mut self, package: Package) {
        self.families
            .entry(package.name.clone())
            .or_default()
            .push(package);
    }

    fn build(object: &str, requires: &[&str]) -> Result<Package, VersionError> {
        let object = VersionedObject::parse(object)?;
        let mut package = Package::new(object.name(), object.version().clone());
        package.requires = Self::parse_requires(requires)?;
        Ok(package)
    }

    fn parse_requires(requires: &[&str]) -> Result<Vec<Requirement>, VersionError> {
        requires.iter().map(|s| Requirement::parse(s)).collect()
    }
}

impl PackageProvider for MemoryRepository {
    fn iter_packages(&self, name: &str, range: Option<&VersionRange>) -> Vec<Package> {
        match self.families.get(name) {
            None => Vec::new(),
            Some(packages) => packages
                .iter()
                .filter(|p| range.map_or(true, |r| r.contains_version(&p.version)))
                .cloned()
                .collect(),
        }
    }
}

/// Result of a candidate lookup through the cache.
pub(crate) enum SliceLookup {
    /// The family does not exist at all.
    FamilyMissing,
    /// The family exists, but no version falls inside the range.
    NoneInRange,
    Slice(VariantSlice),
}

/// Expanded candidate list of one family, in trial-priority order.
/// Variants of the same package version stay contiguous.
struct VariantList {
    entries: Vec<Arc<PackageVariant>>,
}

/// Per-resolve candidate cache.
///
/// Each family is queried from the provider exactly once per resolve and
/// the expanded variants are kept for the lifetime of the cache. This is
/// what insulates a running resolve from changes to the backing store, and
/// where the configured ordering policy is applied.
pub(crate) struct VariantCache<'a> {
    provider: &'a dyn PackageProvider,
    orderers: PackageOrderList,
    building: bool,
    lists: HashMap<String, Option<Rc<VariantList>>>,
}

impl<'a> VariantCache<'a> {
    pub fn new(
        provider: &'a dyn PackageProvider,
        orderers: PackageOrderList,
        building: bool,
    ) -> VariantCache<'a> {
        VariantCache {
            provider,
            orderers,
            building,
            lists: HashMap::new(),
        }
    }

    fn family(&mut self, name: &str) -> Result<Option<Rc<VariantList>>, SolverError> {
        if let Some(cached) = self.lists.get(name) {
            return Ok(cached.clone());
        }

        let mut packages = self.provider.iter_packages(name, None);
        let list = if packages.is_empty() {
            None
        } else {
            packages.sort_by(|a, b| b.version.cmp(&a.version));
            let packages = self.orderers.order(packages);

            let mut entries = Vec::new();
            for package in &packages {
                for variant in self.provider.iter_variants(package) {
                    let mut requires = package.requires.clone();
                    if self.building {
                        requires.extend(package.build_requires.iter().cloned());
                    }
                    requires.extend(variant.requires);
                    entries.push(Arc::new(PackageVariant::new(
                        name,
                        package.version.clone(),
                        variant.index,
                        &requires,
                    )?));
                }
            }
            trace!(family = name, candidates = entries.len(), "loaded family");
            Some(Rc::new(VariantList { entries }))
        };

        self.lists.insert(name.to_string(), list.clone());
        Ok(list)
    }

    /// The candidates of `name` that fall within `range`, in trial order.
    pub fn variant_slice(
        &mut self,
        name: &str,
        range: &VersionRange,
    ) -> Result<SliceLookup, SolverError> {
        match self.family(name)? {
            None => Ok(SliceLookup::FamilyMissing),
            Some(list) => {
                let variants: Vec<Arc<PackageVariant>> = list
                    .entries
                    .iter()
                    .filter(|v| range.contains_version(v.version()))
                    .cloned()
                    .collect();
                if variants.is_empty() {
                    Ok(SliceLookup::NoneInRange)
                } else {
                    Ok(SliceLookup::Slice(VariantSlice::new(name, variants)))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Provider that counts lookups, to pin down the one-load-per-family
    /// cache contract.
    struct CountingProvider {
        repository: MemoryRepository,
        lookups: Cell<usize>,
    }

    impl PackageProvider for CountingProvider {
        fn iter_packages(&self, name: &str, range: Option<&VersionRange>) -> Vec<Package> {
            self.lookups.set(self.lookups.get() + 1);
            self.repository.iter_packages(name, range)
        }
    }

    #[test]
    fn memory_repository_filters_by_range() {
        let mut repo = MemoryRepository::new();
        repo.add("python-2.5.2", &[]).unwrap();
        repo.add("python-2.6.8", &[]).unwrap();
        repo.add("python-2.7.0", &[]).unwrap();

        let range = VersionRange::parse("2.6").unwrap();
        let packages = repo.iter_packages("python", Some(&range));
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].version.to_string(), "2.6.8");
        assert!(repo.iter_packages("ruby", None).is_empty());
    }

    #[test]
    fn variants_expand_in_index_order() {
        let mut repo = MemoryRepository::new();
        repo.add_with_variants(
            "multi-1.0",
            &["base"],
            &[&["python-2.6"], &["python-2.7"]],
        )
        .unwrap();
        let package = &repo.iter_packages("multi", None)[0];
        let variants = repo.iter_variants(package);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].index, Some(0));
        assert_eq!(variants[1].index, Some(1));
    }

    #[test]
    fn cache_loads_each_family_once() {
        let mut repository = MemoryRepository::new();
        repository.add("python-2.5.2", &[]).unwrap();
        repository.add("python-2.6.8", &[]).unwrap();
        let provider = CountingProvider {
            repository,
            lookups: Cell::new(0),
        };

        let mut cache = VariantCache::new(&provider, PackageOrderList::default(), false);
        let any = VersionRange::any();
        let narrow = VersionRange::parse("2.5").unwrap();

        assert!(matches!(
            cache.variant_slice("python", &any),
            Ok(SliceLookup::Slice(_))
        ));
        assert!(matches!(
            cache.variant_slice("python", &narrow),
            Ok(SliceLookup::Slice(_))
        ));
        assert!(matches!(
            cache.variant_slice("python", &VersionRange::parse("9").unwrap()),
            Ok(SliceLookup::NoneInRange)
        ));
        assert_eq!(provider.lookups.get(), 1);

        assert!(matches!(
            cache.variant_slice("ruby", &any),
            Ok(SliceLookup::FamilyMissing)
        ));
        assert_eq!(provider.lookups.get(), 2);
    }

    #[test]
    fn cache_candidates_are_latest_first() {
        let mut repository = MemoryRepository::new();
        repository.add("python-2.5.2", &[]).unwrap();
        repository.add("python-2.7.0", &[]).unwrap();
        repository.add("python-2.6.8", &[]).unwrap();

        let mut cache = VariantCache::new(&repository, PackageOrderList::default(), false);
        let lookup = cache.variant_slice("python", &VersionRange::any()).unwrap();
        let SliceLookup::Slice(slice) = lookup else {
            panic!("expected a slice");
        };
        let versions: Vec<String> = slice
            .variants()
            .iter()
            .map(|v| v.version().to_string())
            .collect();
        assert_eq!(versions, ["2.7.0", "2.6.8", "2.5.2"]);
    }
}
