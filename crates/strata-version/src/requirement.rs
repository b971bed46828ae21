//! Requirements: package names bound to version ranges.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;
use crate::range::VersionRange;
use crate::version::Version;

const OBJECT_SEPS: &[char] = &['-', '@', '#'];
const REQUIREMENT_SEPS: &[char] = &['-', '@', '#', '=', '<', '>'];

/// A versioned object such as `foo-1.0`.
///
/// `foo` on its own is also a valid object: an unversioned one. The
/// separator between name and version may be `-`, `@` or `#` and is purely
/// cosmetic.
#[derive(Debug, Clone)]
pub struct VersionedObject {
    name: String,
    version: Version,
    sep: char,
}

impl VersionedObject {
    /// Parse an object string such as `"foo-1.0"`, `"foo@1.0"` or `"foo"`.
    pub fn parse(text: &str) -> Result<VersionedObject, VersionError> {
        match text.find(OBJECT_SEPS) {
            Some(i) => {
                let sep = text[i..].chars().next().unwrap_or('-');
                Ok(VersionedObject {
                    name: text[..i].to_string(),
                    version: Version::parse(&text[i + 1..])
                        .map_err(|e| VersionError::requirement(text, e.to_string()))?,
                    sep,
                })
            }
            None => Ok(VersionedObject {
                name: text.to_string(),
                version: Version::new(),
                sep: '-',
            }),
        }
    }

    /// Create directly from a name and optional version.
    pub fn construct(name: impl Into<String>, version: Option<Version>) -> VersionedObject {
        VersionedObject {
            name: name.into(),
            version: version.unwrap_or_default(),
            sep: '-',
        }
    }

    /// Name of the object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version of the object.
    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl PartialEq for VersionedObject {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl Eq for VersionedObject {}

impl Hash for VersionedObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for VersionedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}{}{}", self.name, self.sep, self.version)
        }
    }
}

impl FromStr for VersionedObject {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionedObject::parse(s)
    }
}

/// A requirement for a versioned object.
///
/// Examples of valid requirement strings: `foo-1.0`, `foo@1.0`, `foo-1+`,
/// `foo-1+<4.3`, `foo<3`, `foo==1.0.1`. Two prefixes alter the meaning:
///
/// - `!` is a conflict requirement: the named package must NOT resolve into
///   the given range (`!foo` conflicts with every version of `foo`).
/// - `~` is a weak reference: the package is not required, but if present it
///   must lie within the range. It is stored as the conflict of the inverse
///   of the range. The degenerate `~foo` carries no obligation at all and
///   has a `None` range.
#[derive(Debug, Clone)]
pub struct Requirement {
    name: String,
    range: Option<VersionRange>,
    conflict: bool,
    weak: bool,
    sep: char,
}

impl Requirement {
    /// Parse a requirement string.
    pub fn parse(text: &str) -> Result<Requirement, VersionError> {
        let (body, conflict, weak) = if let Some(rest) = text.strip_prefix('!') {
            (rest, true, false)
        } else if let Some(rest) = text.strip_prefix('~') {
            (rest, true, true)
        } else {
            (text, false, false)
        };

        match body.find(REQUIREMENT_SEPS) {
            Some(i) => {
                let name = body[..i].to_string();
                let mut range_str = &body[i..];
                let mut sep = '-';
                if range_str.starts_with(OBJECT_SEPS) {
                    sep = range_str.chars().next().unwrap_or('-');
                    range_str = &range_str[1..];
                }
                let mut range = VersionRange::parse(range_str)
                    .map_err(|e| VersionError::requirement(text, e.to_string()))?;
                if weak {
                    // a weak reference is the conflict of the inverse
                    match range.inverse() {
                        Some(inv) => range = inv,
                        None => {
                            return Ok(Requirement {
                                name,
                                range: None,
                                conflict,
                                weak,
                                sep,
                            })
                        }
                    }
                }
                Ok(Requirement {
                    name,
                    range: Some(range),
                    conflict,
                    weak,
                    sep,
                })
            }
            None => Ok(Requirement {
                name: body.to_string(),
                // '~foo' is the rare no-effect requirement
                range: if weak { None } else { Some(VersionRange::any()) },
                conflict,
                weak,
                sep: '-',
            }),
        }
    }

    /// Create a (non-conflict) requirement directly from a name and range.
    /// A `None` range means any version.
    pub fn construct(name: impl Into<String>, range: Option<VersionRange>) -> Requirement {
        Requirement {
            name: name.into(),
            range: Some(range.unwrap_or_else(VersionRange::any)),
            conflict: false,
            weak: false,
            sep: '-',
        }
    }

    /// Name of the required object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The requirement's range; `None` only for the no-effect weak form.
    pub fn range(&self) -> Option<&VersionRange> {
        self.range.as_ref()
    }

    /// True for conflict requirements such as `!foo` and `~foo-1`.
    pub fn conflict(&self) -> bool {
        self.conflict
    }

    /// True for weak requirements such as `~foo`.
    ///
    /// Weak requirements are also conflict requirements, but not the other
    /// way around.
    pub fn weak(&self) -> bool {
        self.weak
    }

    /// True if this requirement cannot hold together with `other`.
    pub fn conflicts_with(&self, other: &Requirement) -> bool {
        if self.name != other.name {
            return false;
        }
        let (Some(range), Some(other_range)) = (&self.range, &other.range) else {
            return false;
        };
        if self.conflict {
            if other.conflict {
                false
            } else {
                range.is_superset(other_range)
            }
        } else if other.conflict {
            other_range.is_superset(range)
        } else {
            !range.intersects(other_range)
        }
    }

    /// True if this requirement cannot hold for the given resolved object.
    pub fn conflicts_with_object(&self, other: &VersionedObject) -> bool {
        if self.name != other.name() {
            return false;
        }
        let Some(range) = &self.range else {
            return false;
        };
        if self.conflict {
            range.contains_version(other.version())
        } else {
            !range.contains_version(other.version())
        }
    }

    /// The merged result of two requirements for the same object, or `None`
    /// if they are in conflict.
    ///
    /// Example merges: `foo-3+` with `!foo-5+` gives `foo-3+<5`; `foo-1`
    /// with `foo-1.5` gives `foo-1.5`; `!foo-2` with `!foo-5` gives
    /// `!foo-2|5`.
    pub fn merged(&self, other: &Requirement) -> Option<Requirement> {
        if self.name != other.name {
            return None; // cannot merge across object names
        }

        let (range, other_range) = match (&self.range, &other.range) {
            (None, _) => return Some(other.clone()),
            (_, None) => return Some(self.clone()),
            (Some(a), Some(b)) => (a, b),
        };

        if self.conflict {
            if other.conflict {
                let merged_range = range.union(other_range);
                let weak = self.weak && other.weak && !merged_range.is_any();
                Some(Requirement {
                    name: self.name.clone(),
                    range: Some(merged_range),
                    conflict: true,
                    weak,
                    sep: self.sep,
                })
            } else {
                other_range.subtract(range).map(|r| Requirement {
                    range: Some(r),
                    ..other.clone()
                })
            }
        } else if other.conflict {
            range.subtract(other_range).map(|r| Requirement {
                range: Some(r),
                ..self.clone()
            })
        } else {
            range.intersection(other_range).map(|r| Requirement {
                range: Some(r),
                ..self.clone()
            })
        }
    }
}

impl PartialEq for Requirement {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.range == other.range && self.conflict == other.conflict
    }
}

impl Eq for Requirement {}

impl Hash for Requirement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.range.hash(state);
        self.conflict.hash(state);
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.weak {
            "~"
        } else if self.conflict {
            "!"
        } else {
            ""
        };

        // a weak requirement displays its original, un-inverted range
        let shown = if self.weak {
            self.range.as_ref().and_then(|r| r.inverse())
        } else {
            self.range.clone()
        };

        match shown {
            Some(range) if !range.is_any() => {
                let range_str = range.to_string();
                if range_str.starts_with(['=', '<', '>']) {
                    write!(f, "{prefix}{}{range_str}", self.name)
                } else {
                    write!(f, "{prefix}{}{}{range_str}", self.name, self.sep)
                }
            }
            _ => write!(f, "{prefix}{}", self.name),
        }
    }
}

impl FromStr for Requirement {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Requirement::parse(s)
    }
}

impl Serialize for Requirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Requirement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A list of requirements reduced to one effective requirement per object.
///
/// Requirements for a common object are merged left-to-right; the order of
/// first appearance is retained. If two requirements cannot be merged the
/// offending pair is recorded and the merge stops.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementList {
    requirements: Vec<Requirement>,
    conflict: Option<(Requirement, Requirement)>,
    by_name: HashMap<String, Requirement>,
    names: BTreeSet<String>,
    conflict_names: BTreeSet<String>,
}

impl RequirementList {
    /// Merge a list of requirements.
    pub fn new(requirements: &[Requirement]) -> RequirementList {
        let mut by_name: HashMap<String, Requirement> = HashMap::new();

        for req in requirements {
            match by_name.get(req.name()) {
                Some(existing) => match existing.merged(req) {
                    Some(merged) => {
                        by_name.insert(req.name().to_string(), merged);
                    }
                    None => {
                        return RequirementList {
                            requirements: Vec::new(),
                            conflict: Some((existing.clone(), req.clone())),
                            by_name,
                            names: BTreeSet::new(),
                            conflict_names: BTreeSet::new(),
                        };
                    }
                },
                None => {
                    by_name.insert(req.name().to_string(), req.clone());
                }
            }
        }

        let mut seen = BTreeSet::new();
        let mut merged = Vec::new();
        let mut names = BTreeSet::new();
        let mut conflict_names = BTreeSet::new();
        for req in requirements {
            if seen.insert(req.name().to_string()) {
                if let Some(effective) = by_name.get(req.name()) {
                    merged.push(effective.clone());
                }
                if req.conflict() {
                    conflict_names.insert(req.name().to_string());
                } else {
                    names.insert(req.name().to_string());
                }
            }
        }

        RequirementList {
            requirements: merged,
            conflict: None,
            by_name,
            names,
            conflict_names,
        }
    }

    /// The merged requirements in first-appearance order; empty if the list
    /// is in conflict.
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// The first unmergeable pair, if any.
    pub fn conflict(&self) -> Option<&(Requirement, Requirement)> {
        self.conflict.as_ref()
    }

    /// Names of non-conflict requirements.
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Names of conflict requirements.
    pub fn conflict_names(&self) -> &BTreeSet<String> {
        &self.conflict_names
    }

    /// The effective requirement for an object, if present.
    pub fn get(&self, name: &str) -> Option<&Requirement> {
        self.by_name.get(name)
    }

    /// Iterate over the merged requirements.
    pub fn iter(&self) -> std::slice::Iter<'_, Requirement> {
        self.requirements.iter()
    }
}

impl<'a> IntoIterator for &'a RequirementList {
    type Item = &'a Requirement;
    type IntoIter = std::slice::Iter<'a, Requirement>;

    fn into_iter(self) -> Self::IntoIter {
        self.requirements.iter()
    }
}

impl fmt::Display for RequirementList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((a, b)) = &self.conflict {
            write!(f, "{a} <--!--> {b}")
        } else {
            for (i, req) in self.requirements.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{req}")?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    #[test]
    fn versioned_object_parsing() {
        let o = VersionedObject::parse("foo-1.0").unwrap();
        assert_eq!(o.name(), "foo");
        assert_eq!(o.version(), &Version::parse("1.0").unwrap());
        assert_eq!(o.to_string(), "foo-1.0");

        // separators are cosmetic
        assert_eq!(o, VersionedObject::parse("foo@1.0").unwrap());
        assert_eq!(VersionedObject::parse("foo@1.0").unwrap().to_string(), "foo@1.0");

        let u = VersionedObject::parse("foo").unwrap();
        assert!(u.version().is_empty());
        assert_eq!(u.to_string(), "foo");
    }

    #[test]
    fn requirement_parsing() {
        let r = req("foo-1+<4.3");
        assert_eq!(r.name(), "foo");
        assert!(!r.conflict());
        assert!(!r.weak());
        assert_eq!(r.range(), Some(&VersionRange::parse("1+<4.3").unwrap()));

        let c = req("!foo-2");
        assert!(c.conflict());
        assert!(!c.weak());

        let any = req("foo");
        assert!(any.range().unwrap().is_any());
    }

    #[test]
    fn weak_is_conflict_of_inverse() {
        let w = req("~foo-2+");
        assert!(w.conflict());
        assert!(w.weak());
        assert_eq!(w.range(), Some(&VersionRange::parse("<2").unwrap()));
        assert_eq!(w.to_string(), "~foo-2+");

        // '~foo' has no effect at all
        let n = req("~foo");
        assert!(n.range().is_none());
        assert_eq!(n.to_string(), "~foo");
    }

    #[test]
    fn display_round_trips() {
        for s in ["foo", "foo-1.0", "foo-1+", "foo<3", "foo==1.0.1", "!foo", "!foo-4+", "~foo-2+"] {
            assert_eq!(req(s).to_string(), s);
            assert_eq!(req(&req(s).to_string()), req(s));
        }
    }

    #[test]
    fn merge_positive_and_conflict() {
        let merged = req("foo-3+").merged(&req("!foo-5+")).unwrap();
        assert_eq!(merged, req("foo-3+<5"));

        let merged = req("!foo-2").merged(&req("!foo-5")).unwrap();
        assert_eq!(merged, req("!foo-2|5"));

        assert_eq!(req("foo-4").merged(&req("foo-6")), None);
        assert_eq!(req("foo-2").merged(&req("!foo")), None);
    }

    #[test]
    fn merge_intersects_positives() {
        let merged = req("bah-2.4").merged(&req("bah-2.4.1+")).unwrap();
        assert_eq!(merged, req("bah-2.4.1+<2.4_"));
    }

    #[test]
    fn merged_weak_pairs() {
        // overlapping weak ranges stay weak
        let merged = req("~foo-2+").merged(&req("~foo-3+")).unwrap();
        assert!(merged.conflict());
        assert!(merged.weak());
        assert_eq!(merged.to_string(), "~foo-3+");

        // disjoint weak ranges leave no version foo could take: the merge
        // degrades to a conflict with everything
        let merged = req("~foo-1").merged(&req("~foo-2")).unwrap();
        assert!(merged.conflict());
        assert!(!merged.weak());
        assert!(merged.range().unwrap().is_any());
    }

    #[test]
    fn conflicts() {
        assert!(req("foo-1").conflicts_with(&req("!foo-1")));
        assert!(req("!foo").conflicts_with(&req("foo-2")));
        assert!(!req("!foo-2").conflicts_with(&req("foo")));
        assert!(req("foo-4").conflicts_with(&req("foo-6")));
        assert!(!req("foo-4+").conflicts_with(&req("foo-6")));
        assert!(!req("!foo-2").conflicts_with(&req("!foo-2")));
        assert!(!req("foo-1").conflicts_with(&req("bar-1")));
    }

    #[test]
    fn conflicts_with_objects() {
        let obj = VersionedObject::parse("foo-2.5").unwrap();
        assert!(req("!foo-2").conflicts_with_object(&obj));
        assert!(req("foo-3+").conflicts_with_object(&obj));
        assert!(!req("foo-2").conflicts_with_object(&obj));
    }

    #[test]
    fn requirement_list_merges_by_name() {
        let reqs = [req("foo-2+"), req("bar"), req("!foo-4+")];
        let list = RequirementList::new(&reqs);
        assert!(list.conflict().is_none());
        assert_eq!(list.requirements(), &[req("foo-2+<4"), req("bar")]);
        assert_eq!(list.get("foo"), Some(&req("foo-2+<4")));
        assert!(list.names().contains("foo"));
        assert!(list.names().contains("bar"));
        assert!(list.conflict_names().is_empty());
    }

    #[test]
    fn requirement_list_records_first_conflict() {
        let reqs = [req("foo-1"), req("bar"), req("foo-2")];
        let list = RequirementList::new(&reqs);
        let (a, b) = list.conflict().unwrap();
        assert_eq!(a, &req("foo-1"));
        assert_eq!(b, &req("foo-2"));
        assert!(list.requirements().is_empty());
        assert_eq!(list.to_string(), "foo-1 <--!--> foo-2");
    }

    #[test]
    fn weak_requirement_narrows_without_forcing() {
        let reqs = [req("python"), req("~python-2.7+")];
        let list = RequirementList::new(&reqs);
        assert!(list.conflict().is_none());
        assert_eq!(list.get("python"), Some(&req("python-2.7+")));
    }
}
