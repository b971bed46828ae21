//! Package model shared between providers and the solver.

use std::fmt;

use strata_version::{Requirement, RequirementList, Version, VersionedObject};

use crate::fail::SolverError;

/// A package snapshot supplied by a provider.
///
/// Packages are read-only, name+version keyed data; the solver never mutates
/// them. `variants` is the build matrix: each entry narrows the package with
/// further requirements. A package with no variants behaves as one variant
/// with no extra requirements.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub name: String,
    pub version: Version,
    /// Release time; consulted by the soft-timestamp orderer.
    pub timestamp: Option<i64>,
    pub requires: Vec<Requirement>,
    /// Extra requirements merged in when resolving for a build.
    pub build_requires: Vec<Requirement>,
    pub variants: Vec<Vec<Requirement>>,
}

impl Package {
    pub fn new(name: impl Into<String>, version: Version) -> Package {
        Package {
            name: name.into(),
            version,
            timestamp: None,
            requires: Vec::new(),
            build_requires: Vec::new(),
            variants: Vec::new(),
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let object = VersionedObject::construct(self.name.clone(), Some(self.version.clone()));
        write!(f, "{object}")
    }
}

/// One build configuration of a package.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    /// Zero-based index within the package, `None` when the package has no
    /// variants.
    pub index: Option<usize>,
    /// The variant's own requirements, on top of the package requires.
    pub requires: Vec<Requirement>,
}

/// A single candidate (package, variant) pair tracked by the solver, with
/// its full merged requirement list.
#[derive(Debug, Clone)]
pub struct PackageVariant {
    name: String,
    version: Version,
    index: Option<usize>,
    requires: RequirementList,
}

impl PackageVariant {
    pub(crate) fn new(
        name: &str,
        version: Version,
        index: Option<usize>,
        requires: &[Requirement],
    ) -> Result<PackageVariant, SolverError> {
        let requires = RequirementList::new(requires);
        if let Some((a, b)) = requires.conflict() {
            let object = VersionedObject::construct(name.to_string(), Some(version));
            return Err(SolverError::InvalidPackage {
                package: object.to_string(),
                conflict: format!("{a} <--!--> {b}"),
            });
        }
        Ok(PackageVariant {
            name: name.to_string(),
            version,
            index,
            requires,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Index of the variant within its package, `None` for variant-less
    /// packages.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// The merged requirements of package and variant.
    pub fn requires(&self) -> &[Requirement] {
        self.requires.requirements()
    }

    pub(crate) fn requires_list(&self) -> &RequirementList {
        &self.requires
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Requirement> {
        self.requires.get(name)
    }

    /// The `name-version` pair of this candidate.
    pub fn versioned_object(&self) -> VersionedObject {
        VersionedObject::construct(self.name.clone(), Some(self.version.clone()))
    }
}

impl PartialEq for PackageVariant {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version && self.index == other.index
    }
}

impl Eq for PackageVariant {}

impl fmt::Display for PackageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.versioned_object())?;
        if let Some(index) = self.index {
            write!(f, "[{index}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    #[test]
    fn variant_merges_requires() {
        let variant = PackageVariant::new(
            "foo",
            Version::parse("1.2").unwrap(),
            Some(1),
            &[req("python-2.6"), req("python-2.6.5+")],
        )
        .unwrap();
        assert_eq!(variant.requires(), &[req("python-2.6.5+<2.6_")]);
        assert_eq!(variant.to_string(), "foo-1.2[1]");
    }

    #[test]
    fn variant_rejects_internal_conflicts() {
        let result = PackageVariant::new(
            "foo",
            Version::parse("1").unwrap(),
            None,
            &[req("python-2.6"), req("python-2.7")],
        );
        assert!(matches!(result, Err(SolverError::InvalidPackage { .. })));
    }

    #[test]
    fn unversioned_display() {
        let variant = PackageVariant::new("nada", Version::new(), None, &[]).unwrap();
        assert_eq!(variant.to_string(), "nada");
    }
}
