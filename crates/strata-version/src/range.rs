//! Version ranges: sorted unions of contiguous version intervals.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;
use crate::version::Version;

/// Inclusive or exclusive lower bound of one contiguous interval.
///
/// The minimum bound (empty version, inclusive) is the open lower end of
/// version-space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LowerBound {
    version: Version,
    inclusive: bool,
}

impl LowerBound {
    fn min() -> LowerBound {
        LowerBound {
            version: Version::new(),
            inclusive: true,
        }
    }

    fn contains_version(&self, version: &Version) -> bool {
        *version > self.version || (self.inclusive && *version == self.version)
    }
}

impl Ord for LowerBound {
    fn cmp(&self, other: &Self) -> Ordering {
        // at equal versions an inclusive bound admits more, so it sorts first
        self.version.cmp(&other.version).then_with(|| {
            match (self.inclusive, other.inclusive) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            }
        })
    }
}

impl PartialOrd for LowerBound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LowerBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.version.is_empty(), self.inclusive) {
            (true, true) => Ok(()),
            (true, false) => f.write_str(">"),
            (false, true) => write!(f, "{}+", self.version),
            (false, false) => write!(f, ">{}", self.version),
        }
    }
}

/// Inclusive or exclusive upper bound of one contiguous interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct UpperBound {
    version: Version,
    inclusive: bool,
}

impl UpperBound {
    fn inf() -> UpperBound {
        UpperBound {
            version: Version::inf(),
            inclusive: true,
        }
    }

    fn new(version: Version, inclusive: bool, text: &str) -> Result<UpperBound, VersionError> {
        if version.is_empty() && !inclusive {
            return Err(VersionError::range(
                text,
                "upper bound must not exclude every version",
            ));
        }
        Ok(UpperBound { version, inclusive })
    }

    fn contains_version(&self, version: &Version) -> bool {
        *version < self.version || (self.inclusive && *version == self.version)
    }
}

impl Ord for UpperBound {
    fn cmp(&self, other: &Self) -> Ordering {
        // at equal versions an exclusive bound admits less, so it sorts first
        self.version.cmp(&other.version).then_with(|| {
            match (self.inclusive, other.inclusive) {
                (false, true) => Ordering::Less,
                (true, false) => Ordering::Greater,
                _ => Ordering::Equal,
            }
        })
    }
}

impl PartialOrd for UpperBound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for UpperBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inclusive {
            write!(f, "<={}", self.version)
        } else {
            write!(f, "<{}", self.version)
        }
    }
}

/// One contiguous interval of version-space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Bound {
    lower: LowerBound,
    upper: UpperBound,
}

impl Bound {
    fn any() -> Bound {
        Bound {
            lower: LowerBound::min(),
            upper: UpperBound::inf(),
        }
    }

    fn new(lower: LowerBound, upper: UpperBound, text: &str) -> Result<Bound, VersionError> {
        if lower.version > upper.version
            || (lower.version == upper.version && !(lower.inclusive && upper.inclusive))
        {
            return Err(VersionError::range(
                text,
                "lower bound must be below upper bound",
            ));
        }
        Ok(Bound { lower, upper })
    }

    fn lower_bounded(&self) -> bool {
        self.lower != LowerBound::min()
    }

    fn upper_bounded(&self) -> bool {
        self.upper != UpperBound::inf()
    }

    fn contains_version(&self, version: &Version) -> bool {
        self.version_containment(version) == Ordering::Equal
    }

    /// Where `version` sits relative to this interval: below, inside, above.
    fn version_containment(&self, version: &Version) -> Ordering {
        if !self.lower.contains_version(version) {
            return Ordering::Less;
        }
        if !self.upper.contains_version(version) {
            return Ordering::Greater;
        }
        Ordering::Equal
    }

    fn contains_bound(&self, other: &Bound) -> bool {
        self.lower <= other.lower && self.upper >= other.upper
    }

    fn intersects(&self, other: &Bound) -> bool {
        let lower = (&self.lower).max(&other.lower);
        let upper = (&self.upper).min(&other.upper);
        lower.version < upper.version
            || (lower.version == upper.version && lower.inclusive && upper.inclusive)
    }

    fn intersection(&self, other: &Bound) -> Option<Bound> {
        let lower = (&self.lower).max(&other.lower);
        let upper = (&self.upper).min(&other.upper);
        if lower.version < upper.version
            || (lower.version == upper.version && lower.inclusive && upper.inclusive)
        {
            Some(Bound {
                lower: lower.clone(),
                upper: upper.clone(),
            })
        } else {
            None
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.upper.version.is_inf() {
            write!(f, "{}", self.lower)
        } else if self.lower.version == self.upper.version {
            write!(f, "=={}", self.lower.version)
        } else if self.lower.inclusive && self.upper.inclusive {
            if !self.lower.version.is_empty() {
                write!(f, "{}..{}", self.lower.version, self.upper.version)
            } else {
                write!(f, "<={}", self.upper.version)
            }
        } else if self.lower.inclusive
            && !self.upper.inclusive
            && self.lower.version.next() == self.upper.version
        {
            write!(f, "{}", self.lower.version)
        } else {
            write!(f, "{}{}", self.lower, self.upper)
        }
    }
}

/// Relational operator for [`VersionRange::from_version_op`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A set of one or more contiguous, non-overlapping ranges of versions.
///
/// The textual grammar (all equivalent forms on one line):
///
/// - `""`: the "any" range, containing every version;
/// - `"3"`: superset syntax, contains `3`, `3.0`, `3.1.4` and so on;
/// - `"==3"`: exactly the version `3`;
/// - `"2+"`, `">=2"`: inclusive lower bound;
/// - `">2"`: exclusive lower bound;
/// - `"<5"`: exclusive upper bound (trailing zero tokens are dropped first,
///   so `<1.0.0` reads as `<1`);
/// - `"<=5"`: inclusive upper bound;
/// - `"1+<5"`, `">=1<5"`, `">=1,<5"`, `"<5,>=1"`: bounded interval;
/// - `"1..5"`: inclusive bounded interval;
/// - `"4|6+"`: union of sub-ranges.
///
/// Overlapping or adjacent sub-ranges are coalesced at construction, so
/// `"3+<6|4+<8"` equals `"3+<8"`. Every operation is pure; ranges are never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionRange {
    bounds: Vec<Bound>,
}

impl VersionRange {
    /// The "any" range.
    pub fn any() -> VersionRange {
        VersionRange {
            bounds: vec![Bound::any()],
        }
    }

    /// Parse a range string; see the type docs for the grammar.
    pub fn parse(text: &str) -> Result<VersionRange, VersionError> {
        let mut bounds = Vec::new();
        for part in text.split('|') {
            bounds.push(parse_bound(part)?);
        }
        Ok(VersionRange {
            bounds: union_bounds(bounds),
        })
    }

    /// The superset range of a version: `>=v, <next(v)`.
    ///
    /// For example the range of `3` contains `3`, `3.0` and `3.1.4`.
    pub fn from_version(version: Version) -> VersionRange {
        let upper = UpperBound {
            version: version.next(),
            inclusive: false,
        };
        VersionRange {
            bounds: vec![Bound {
                lower: LowerBound {
                    version,
                    inclusive: true,
                },
                upper,
            }],
        }
    }

    /// A range relating to a version through an operator, e.g.
    /// `from_version_op(v, RangeOp::Gte)` is `v+`.
    pub fn from_version_op(version: Version, op: RangeOp) -> Result<VersionRange, VersionError> {
        let text = version.to_string();
        let bound = match op {
            RangeOp::Eq => Bound::new(
                LowerBound {
                    version: version.clone(),
                    inclusive: true,
                },
                UpperBound::new(version, true, &text)?,
                &text,
            )?,
            RangeOp::Gt => Bound {
                lower: LowerBound {
                    version,
                    inclusive: false,
                },
                upper: UpperBound::inf(),
            },
            RangeOp::Gte => Bound {
                lower: LowerBound {
                    version,
                    inclusive: true,
                },
                upper: UpperBound::inf(),
            },
            RangeOp::Lt => Bound::new(
                LowerBound::min(),
                UpperBound::new(version, false, &text)?,
                &text,
            )?,
            RangeOp::Lte => Bound::new(
                LowerBound::min(),
                UpperBound::new(version, true, &text)?,
                &text,
            )?,
        };
        Ok(VersionRange {
            bounds: vec![bound],
        })
    }

    /// A range containing exactly the given versions (`==a|==b|...`), or
    /// `None` if no versions are given.
    pub fn from_versions<I: IntoIterator<Item = Version>>(versions: I) -> Option<VersionRange> {
        let versions: BTreeSet<Version> = versions.into_iter().collect();
        if versions.is_empty() {
            return None;
        }
        let bounds = versions
            .into_iter()
            .map(|v| Bound {
                lower: LowerBound {
                    version: v.clone(),
                    inclusive: true,
                },
                upper: UpperBound {
                    version: v,
                    inclusive: true,
                },
            })
            .collect();
        Some(VersionRange { bounds })
    }

    /// A single contiguous range between two optional bound versions.
    pub fn as_span(
        lower_version: Option<Version>,
        upper_version: Option<Version>,
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> Result<VersionRange, VersionError> {
        let lower = match lower_version {
            Some(version) => LowerBound {
                version,
                inclusive: lower_inclusive,
            },
            None => LowerBound::min(),
        };
        let upper = match upper_version {
            Some(version) => UpperBound::new(version, upper_inclusive, "span")?,
            None => UpperBound::inf(),
        };
        let bound = Bound::new(lower, upper, "span")?;
        Ok(VersionRange {
            bounds: vec![bound],
        })
    }

    /// True if this is the "any" range.
    pub fn is_any(&self) -> bool {
        self.bounds.len() == 1 && self.bounds[0] == Bound::any()
    }

    /// True if the range has a lower bound above the empty version.
    pub fn lower_bounded(&self) -> bool {
        self.bounds[0].lower_bounded()
    }

    /// True if the range has a finite upper bound.
    pub fn upper_bounded(&self) -> bool {
        self.bounds[self.bounds.len() - 1].upper_bounded()
    }

    /// True if the range is bounded at both ends.
    pub fn bounded(&self) -> bool {
        self.lower_bounded() && self.upper_bounded()
    }

    /// True unless the range denotes a single version superset (`"3"`) or a
    /// single pinned version (`"==3"`).
    pub fn is_inexact(&self) -> bool {
        if self.bounds.len() != 1 {
            return true;
        }
        let b = &self.bounds[0];
        let superset = b.lower.inclusive
            && !b.upper.inclusive
            && b.lower.version.next() == b.upper.version;
        let pinned =
            b.lower.inclusive && b.upper.inclusive && b.lower.version == b.upper.version;
        !(superset || pinned)
    }

    /// Number of contiguous sub-ranges.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Always false; a range contains at least one interval.
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// OR together two ranges.
    pub fn union(&self, other: &VersionRange) -> VersionRange {
        let mut bounds = self.bounds.clone();
        bounds.extend_from_slice(&other.bounds);
        VersionRange {
            bounds: union_bounds(bounds),
        }
    }

    /// AND together two ranges; `None` if they do not overlap.
    pub fn intersection(&self, other: &VersionRange) -> Option<VersionRange> {
        let mut bounds = Vec::new();
        for b1 in &self.bounds {
            for b2 in &other.bounds {
                if let Some(b) = b1.intersection(b2) {
                    bounds.push(b);
                }
            }
        }
        if bounds.is_empty() {
            None
        } else {
            Some(VersionRange { bounds })
        }
    }

    /// The complement over version-space; `None` if this is the "any" range
    /// (whose inverse contains no versions). The complement of an empty
    /// result is again "any".
    pub fn inverse(&self) -> Option<VersionRange> {
        if self.is_any() {
            return None;
        }

        let mut lowers: Vec<Option<LowerBound>> = vec![None];
        let mut uppers: Vec<Option<UpperBound>> = Vec::new();

        for bound in &self.bounds {
            if bound.lower.version.is_empty() && bound.lower.inclusive {
                uppers.push(None);
            } else {
                uppers.push(Some(UpperBound {
                    version: bound.lower.version.clone(),
                    inclusive: !bound.lower.inclusive,
                }));
            }
            if bound.upper.version.is_inf() {
                lowers.push(None);
            } else {
                lowers.push(Some(LowerBound {
                    version: bound.upper.version.clone(),
                    inclusive: !bound.upper.inclusive,
                }));
            }
        }
        uppers.push(None);

        let mut bounds = Vec::new();
        for (lower, upper) in lowers.into_iter().zip(uppers) {
            if lower.is_some() || upper.is_some() {
                bounds.push(Bound {
                    lower: lower.unwrap_or_else(LowerBound::min),
                    upper: upper.unwrap_or_else(UpperBound::inf),
                });
            }
        }
        Some(VersionRange { bounds })
    }

    /// This range minus another; `None` if nothing remains.
    pub fn subtract(&self, other: &VersionRange) -> Option<VersionRange> {
        match other.inverse() {
            None => None,
            Some(inv) => self.intersection(&inv),
        }
    }

    /// True if `version` lies within the range.
    pub fn contains_version(&self, version: &Version) -> bool {
        if self.bounds.len() < 5 {
            // not worth the overhead of binary search
            return self.bounds.iter().any(|b| b.contains_version(version));
        }
        let probe = Bound {
            lower: LowerBound {
                version: version.clone(),
                inclusive: true,
            },
            upper: UpperBound::inf(),
        };
        let i = self.bounds.partition_point(|b| *b < probe);
        (i > 0 && self.bounds[i - 1].contains_version(version))
            || (i < self.bounds.len() && self.bounds[i].contains_version(version))
    }

    /// True if every interval of `other` is contained in this range.
    pub fn is_superset(&self, other: &VersionRange) -> bool {
        let mut lo = 0;
        for b2 in &other.bounds {
            let i = lo + self.bounds[lo..].partition_point(|b| b < b2);
            if i > 0 && self.bounds[i - 1].contains_bound(b2) {
                lo = i - 1;
                continue;
            }
            if i < self.bounds.len() && self.bounds[i].contains_bound(b2) {
                lo = i;
                continue;
            }
            return false;
        }
        true
    }

    /// True if this range is contained in `other`.
    pub fn is_subset(&self, other: &VersionRange) -> bool {
        other.is_superset(self)
    }

    /// True if the two ranges share any version.
    pub fn intersects(&self, other: &VersionRange) -> bool {
        let (small, large) = if self.bounds.len() <= other.bounds.len() {
            (&self.bounds, &other.bounds)
        } else {
            (&other.bounds, &self.bounds)
        };

        if large.len() < 5 {
            // not worth the overhead of binary search
            for b1 in small {
                for b2 in large {
                    if b1.intersects(b2) {
                        return true;
                    }
                }
            }
            return false;
        }

        let mut lo = 0;
        for b1 in small {
            let i = lo + large[lo..].partition_point(|b| b < b1);
            if i > 0 && large[i - 1].intersects(b1) {
                return true;
            }
            if i < large.len() && large[i].intersects(b1) {
                return true;
            }
            lo = i.saturating_sub(1);
        }
        false
    }

    /// A single contiguous range spanning from the lowest to the highest
    /// bound, e.g. the span of `2+<4|6+<8` is `2+<8`.
    pub fn span(&self) -> VersionRange {
        let bound = Bound {
            lower: self.bounds[0].lower.clone(),
            upper: self.bounds[self.bounds.len() - 1].upper.clone(),
        };
        VersionRange {
            bounds: vec![bound],
        }
    }

    /// Split into separate contiguous ranges, e.g. `3|5+` into `[3, 5+]`.
    pub fn split(&self) -> Vec<VersionRange> {
        self.bounds
            .iter()
            .map(|b| VersionRange {
                bounds: vec![b.clone()],
            })
            .collect()
    }

    /// The pinned versions of the range (`==a|==b` gives `[a, b]`), or
    /// `None` if any part of the range is not a pinned version.
    pub fn to_versions(&self) -> Option<Vec<Version>> {
        let mut versions = Vec::new();
        for bound in &self.bounds {
            if bound.lower.inclusive
                && bound.upper.inclusive
                && bound.lower.version == bound.upper.version
            {
                versions.push(bound.lower.version.clone());
            }
        }
        if versions.len() == self.bounds.len() {
            Some(versions)
        } else {
            None
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, bound) in self.bounds.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{bound}")?;
        }
        Ok(())
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Merge a bound list into sorted, disjoint, non-adjacent form.
fn union_bounds(mut bounds: Vec<Bound>) -> Vec<Bound> {
    if bounds.len() < 2 {
        return bounds;
    }
    bounds.sort();

    let mut merged = Vec::new();
    let mut start = 0;
    let mut upper = bounds[0].upper.clone();
    let mut prev_upper_inclusive = bounds[0].upper.inclusive;

    for i in 1..bounds.len() {
        let bound = &bounds[i];
        let starts_new_group = bound.lower.version > upper.version
            || (bound.lower.version == upper.version
                && !bound.lower.inclusive
                && !prev_upper_inclusive);
        if starts_new_group {
            merged.push(Bound {
                lower: bounds[start].lower.clone(),
                upper: upper.clone(),
            });
            start = i;
            upper = bound.upper.clone();
        } else if bound.upper > upper {
            upper = bound.upper.clone();
        }
        prev_upper_inclusive = bound.upper.inclusive;
    }
    merged.push(Bound {
        lower: bounds[start].lower.clone(),
        upper,
    });
    merged
}

fn parse_version_in(part: &str, text: &str) -> Result<Version, VersionError> {
    Version::parse(text).map_err(|e| VersionError::range(part, e.to_string()))
}

/// The `"V+"` / `">=V"` / `">V"` shapes; `None` if `s` is not one of them.
fn lower_side(s: &str) -> Option<(&str, bool)> {
    if let Some(v) = s.strip_prefix(">=") {
        Some((v, true))
    } else if let Some(v) = s.strip_prefix('>') {
        Some((v, false))
    } else {
        s.strip_suffix('+').map(|v| (v, true))
    }
}

/// The `"<V"` / `"<=V"` shapes; `None` if `s` is not one of them.
fn upper_side(s: &str) -> Option<(&str, bool)> {
    if let Some(v) = s.strip_prefix("<=") {
        Some((v, true))
    } else if let Some(v) = s.strip_prefix('<') {
        Some((v, false))
    } else {
        None
    }
}

fn parse_lower(s: &str, part: &str) -> Result<LowerBound, VersionError> {
    let (version_str, inclusive) = lower_side(s).unwrap_or((s, true));
    Ok(LowerBound {
        version: parse_version_in(part, version_str)?,
        inclusive,
    })
}

fn parse_upper(s: &str, part: &str) -> Result<UpperBound, VersionError> {
    let Some((version_str, inclusive)) = upper_side(s) else {
        return Err(VersionError::range(part, "expected an upper bound"));
    };
    let mut version = parse_version_in(part, version_str)?;
    if !inclusive {
        version = version.stripped_trailing_zeros();
    }
    UpperBound::new(version, inclusive, part)
}

/// Parse one `|`-separated part of a range string.
fn parse_bound(part: &str) -> Result<Bound, VersionError> {
    if part.is_empty() {
        return Ok(Bound::any());
    }

    // "==V": exactly one version
    if let Some(rest) = part.strip_prefix("==") {
        let version = parse_version_in(part, rest)?;
        return Bound::new(
            LowerBound {
                version: version.clone(),
                inclusive: true,
            },
            UpperBound::new(version, true, part)?,
            part,
        );
    }

    // comma-separated bound pair, in either order
    if let Some((a, b)) = part.split_once(',') {
        let sides = match (lower_side(a), upper_side(b)) {
            (Some(lo), Some(up)) => Some((lo, up)),
            _ => match (upper_side(a), lower_side(b)) {
                (Some(up), Some(lo)) => Some((lo, up)),
                _ => None,
            },
        };
        let Some(((lo_str, lo_inclusive), (up_str, up_inclusive))) = sides else {
            return Err(VersionError::range(
                part,
                "expected one lower and one upper bound",
            ));
        };
        let lower = LowerBound {
            version: parse_version_in(part, lo_str)?,
            inclusive: lo_inclusive,
        };
        let mut up_version = parse_version_in(part, up_str)?;
        if !up_inclusive {
            up_version = up_version.stripped_trailing_zeros();
        }
        return Bound::new(lower, UpperBound::new(up_version, up_inclusive, part)?, part);
    }

    // "V..W": inclusive bounded interval
    if let Some((a, b)) = part.split_once("..") {
        let lower = LowerBound {
            version: parse_version_in(part, a)?,
            inclusive: true,
        };
        let upper = UpperBound::new(parse_version_in(part, b)?, true, part)?;
        return Bound::new(lower, upper, part);
    }

    // combined lower+upper, e.g. "1+<5", ">=1<5", ">1<=5"
    if let Some(idx) = part.find('<') {
        if idx > 0 {
            let (lo_str, up_str) = part.split_at(idx);
            let lower = parse_lower(lo_str, part)?;
            let upper = parse_upper(up_str, part)?;
            return Bound::new(lower, upper, part);
        }
        let upper = parse_upper(part, part)?;
        return Bound::new(LowerBound::min(), upper, part);
    }

    // lower bound only
    if part.starts_with('>') || part.ends_with('+') {
        let lower = parse_lower(part, part)?;
        return Ok(Bound {
            lower,
            upper: UpperBound::inf(),
        });
    }

    // plain version: superset syntax
    let version = parse_version_in(part, part)?;
    let upper = UpperBound {
        version: version.next(),
        inclusive: false,
    };
    Ok(Bound {
        lower: LowerBound {
            version,
            inclusive: true,
        },
        upper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    fn ver(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn display_round_trips() {
        let cases = [
            ("", ""),
            ("3", "3"),
            ("==2", "==2"),
            ("3+", "3+"),
            (">=3", "3+"),
            (">3", ">3"),
            ("<3", "<3"),
            ("<=3", "<=3"),
            ("3..5", "3..5"),
            ("1+<=5", "1..5"),
            ("2+<4", "2+<4"),
            (">=2<4", "2+<4"),
            (">=2,<4", "2+<4"),
            ("<4,>=2", "2+<4"),
            (">2<=4", ">2<=4"),
            ("2|6+", "2|6+"),
            ("3+<6|4+<8", "3+<8"),
            (">", ">"),
            // `<=` admits only the empty version, which displays pinned
            ("<=", "=="),
            ("<1.0.0", "<1"),
        ];
        for (input, expected) in cases {
            let r = range(input);
            assert_eq!(r.to_string(), expected, "display of '{input}'");
            assert_eq!(range(&r.to_string()), r, "round trip of '{input}'");
        }
    }

    #[test]
    fn rejects_bad_ranges() {
        for s in ["<", "4+<2", "1+<1.0.0", "1+<1", "2,4", "1..", "==03"] {
            assert!(VersionRange::parse(s).is_err(), "'{s}' should not parse");
        }
    }

    #[test]
    fn union_of_halves_is_any() {
        assert_eq!(range("3+").union(&range("<3")), VersionRange::any());
        assert!(range("3+").union(&range("<3")).is_any());
    }

    #[test]
    fn intersection_of_halves_is_empty() {
        assert_eq!(range("3+").intersection(&range("<3")), None);
        assert_eq!(
            range("4+<6").intersection(&range("5+")),
            Some(range("5+<6"))
        );
    }

    #[test]
    fn inverse_flips_bounds() {
        assert_eq!(range("3+").inverse(), Some(range("<3")));
        assert_eq!(range("<3").inverse(), Some(range("3+")));
        assert_eq!(VersionRange::any().inverse(), None);
        // the inverse of a superset range leaves a hole
        assert_eq!(range("3").inverse(), Some(range("<3|3_+")));
    }

    #[test]
    fn containment() {
        assert!(range("3..5").contains_version(&ver("5")));
        assert!(!range("3..5").contains_version(&ver("5_")));
        assert!(range("2.6").contains_version(&ver("2.6.8")));
        assert!(!range("2.6").contains_version(&ver("2.7")));
        assert!(range("").contains_version(&ver("anything")));
    }

    #[test]
    fn containment_uses_binary_search_beyond_four_bounds() {
        let r = range("1|3|5|7|9|11");
        assert_eq!(r.len(), 6);
        assert!(r.contains_version(&ver("7.2")));
        assert!(!r.contains_version(&ver("8")));
        assert!(!r.contains_version(&ver("12")));
    }

    #[test]
    fn superset_and_subset() {
        assert!(range("2+<10").is_superset(&range("3|5+<6")));
        assert!(!range("2+<10").is_superset(&range("3|10+")));
        assert!(range("3").is_subset(&range("2+")));
        assert!(range("").is_superset(&range("4|6+")));
    }

    #[test]
    fn intersects_test() {
        assert!(range("2+<4").intersects(&range("3+")));
        assert!(!range("2+<4").intersects(&range("4+")));
        assert!(range("1|3|5|7|9").intersects(&range("9.5")));
        assert!(!range("1|3|5|7|9").intersects(&range("==8")));
    }

    #[test]
    fn span_covers_everything() {
        assert_eq!(range("2+<4|6+<8").span(), range("2+<8"));
    }

    #[test]
    fn split_into_contiguous_parts() {
        assert_eq!(range("3|5+").split(), vec![range("3"), range("5+")]);
    }

    #[test]
    fn version_constructors() {
        assert_eq!(VersionRange::from_version(ver("3")), range("3"));
        assert_eq!(
            VersionRange::from_version_op(ver("3"), RangeOp::Lt).unwrap(),
            range("<3")
        );
        assert_eq!(
            VersionRange::from_versions([ver("3"), ver("5.1"), ver("3")]).unwrap(),
            range("==3|==5.1")
        );
        assert_eq!(VersionRange::from_versions(Vec::new()), None);
        assert_eq!(
            VersionRange::as_span(Some(ver("2")), Some(ver("4")), true, false).unwrap(),
            range("2+<4")
        );
    }

    #[test]
    fn to_versions_requires_pins() {
        assert_eq!(
            range("==3|==5.1").to_versions(),
            Some(vec![ver("3"), ver("5.1")])
        );
        assert_eq!(range("3+").to_versions(), None);
    }

    #[test]
    fn exactness() {
        assert!(!range("3").is_inexact());
        assert!(!range("==3").is_inexact());
        assert!(range("3+").is_inexact());
        assert!(range("3|5").is_inexact());
        assert!(range("").is_inexact());
    }

    #[test]
    fn boundedness() {
        assert!(range("2+<4").bounded());
        assert!(!range("2+").upper_bounded());
        assert!(!range("<4").lower_bounded());
        assert!(range(">").lower_bounded());
    }

    #[test]
    fn serde_round_trip() {
        let r = range("2+<4|6");
        let json = serde_json::to_string(&r).unwrap();
        let back: VersionRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
