//! Versions: ordered token sequences with cosmetic separators.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;
use crate::token::VersionToken;

/// A version: zero or more tokens separated by `.` or `-`.
///
/// Separators are cosmetic only; `1.2` and `1-2` are equal. The empty
/// version is the smallest possible version and denotes an unversioned
/// object; it also serves as the open lower bound of version-space. The
/// [`inf`] sentinel is greater than every other version and serves as the
/// open upper bound.
///
/// Ordering is lexicographic over tokens, with a shorter version sorting
/// before any longer version it prefixes (`1` < `1.0`).
///
/// [`inf`]: Version::inf
#[derive(Debug, Clone)]
pub struct Version {
    repr: Repr,
}

#[derive(Debug, Clone)]
enum Repr {
    Finite {
        tokens: Vec<VersionToken>,
        seps: Vec<char>,
    },
    Inf,
}

impl Version {
    /// The empty (zero) version.
    pub fn new() -> Version {
        Version {
            repr: Repr::Finite {
                tokens: Vec::new(),
                seps: Vec::new(),
            },
        }
    }

    /// The infinite version, greater than all others.
    pub fn inf() -> Version {
        Version { repr: Repr::Inf }
    }

    /// Parse a version string, e.g. `"1.2.3"` or `"2.7-alpha1"`.
    ///
    /// The empty string parses to the empty version.
    pub fn parse(text: &str) -> Result<Version, VersionError> {
        if text.is_empty() {
            return Ok(Version::new());
        }

        let mut tokens = Vec::new();
        let mut seps = Vec::new();
        let mut current = String::new();

        for ch in text.chars() {
            if ch == '.' || ch == '-' {
                if current.is_empty() {
                    return Err(VersionError::version(text, "empty token"));
                }
                tokens.push(
                    VersionToken::parse(&current)
                        .map_err(|e| VersionError::version(text, e.to_string()))?,
                );
                seps.push(ch);
                current.clear();
            } else {
                current.push(ch);
            }
        }
        if current.is_empty() {
            return Err(VersionError::version(text, "empty token"));
        }
        tokens.push(
            VersionToken::parse(&current).map_err(|e| VersionError::version(text, e.to_string()))?,
        );

        Ok(Version {
            repr: Repr::Finite { tokens, seps },
        })
    }

    /// The tokens of a finite version; `None` for the infinite version.
    pub fn tokens(&self) -> Option<&[VersionToken]> {
        match &self.repr {
            Repr::Finite { tokens, .. } => Some(tokens),
            Repr::Inf => None,
        }
    }

    /// Number of tokens (zero for the empty and infinite versions).
    pub fn len(&self) -> usize {
        self.tokens().map_or(0, |tokens| tokens.len())
    }

    /// True for the empty (zero) version.
    pub fn is_empty(&self) -> bool {
        matches!(&self.repr, Repr::Finite { tokens, .. } if tokens.is_empty())
    }

    /// True for the infinite version.
    pub fn is_inf(&self) -> bool {
        matches!(self.repr, Repr::Inf)
    }

    /// Semantic versioning major version token.
    pub fn major(&self) -> Option<&VersionToken> {
        self.tokens().and_then(|t| t.first())
    }

    /// Semantic versioning minor version token.
    pub fn minor(&self) -> Option<&VersionToken> {
        self.tokens().and_then(|t| t.get(1))
    }

    /// Semantic versioning patch version token.
    pub fn patch(&self) -> Option<&VersionToken> {
        self.tokens().and_then(|t| t.get(2))
    }

    /// The next version: the smallest version greater than this one and all
    /// of its extensions, e.g. `next(1.2)` is `1.2_` which sorts above
    /// `1.2.9` but below `1.3`. The next version after the empty version is
    /// infinity.
    pub fn next(&self) -> Version {
        match &self.repr {
            Repr::Finite { tokens, seps } if !tokens.is_empty() => {
                let mut tokens = tokens.clone();
                let last = tokens.pop().map(|t| t.next());
                tokens.extend(last);
                Version {
                    repr: Repr::Finite {
                        tokens,
                        seps: seps.clone(),
                    },
                }
            }
            _ => Version::inf(),
        }
    }

    /// A copy with trailing `0` tokens removed (`1.0.0` becomes `1`), used
    /// when normalizing exclusive upper bounds.
    pub(crate) fn stripped_trailing_zeros(&self) -> Version {
        match &self.repr {
            Repr::Finite { tokens, seps } => {
                let mut tokens = tokens.clone();
                let mut seps = seps.clone();
                while tokens.len() > 1 && tokens.last().is_some_and(|t| t.is_zero()) {
                    tokens.pop();
                    seps.pop();
                }
                Version {
                    repr: Repr::Finite { tokens, seps },
                }
            }
            Repr::Inf => Version::inf(),
        }
    }

    /// A copy of the version with at most `len` leading tokens.
    pub fn trim(&self, len: usize) -> Version {
        match &self.repr {
            Repr::Finite { tokens, seps } => Version {
                repr: Repr::Finite {
                    tokens: tokens.iter().take(len).cloned().collect(),
                    seps: seps.iter().take(len.saturating_sub(1)).copied().collect(),
                },
            },
            Repr::Inf => Version::inf(),
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::new()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        // separators are cosmetic
        match (&self.repr, &other.repr) {
            (Repr::Inf, Repr::Inf) => true,
            (Repr::Finite { tokens: a, .. }, Repr::Finite { tokens: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.repr {
            Repr::Inf => state.write_u8(1),
            Repr::Finite { tokens, .. } => {
                state.write_u8(0);
                tokens.hash(state);
            }
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.repr, &other.repr) {
            (Repr::Inf, Repr::Inf) => Ordering::Equal,
            (Repr::Inf, _) => Ordering::Greater,
            (_, Repr::Inf) => Ordering::Less,
            (Repr::Finite { tokens: a, .. }, Repr::Finite { tokens: b, .. }) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Inf => f.write_str("[INF]"),
            Repr::Finite { tokens, seps } => {
                for (i, token) in tokens.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", seps[i - 1])?;
                    }
                    write!(f, "{token}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ver(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn separators_are_cosmetic() {
        assert_eq!(ver("1.2"), ver("1-2"));
        assert_eq!(ver("1.2-3"), ver("1-2.3"));
        assert_eq!(ver(""), ver(""));
    }

    #[test]
    fn display_keeps_separators() {
        assert_eq!(ver("1.2-3").to_string(), "1.2-3");
        assert_eq!(ver("").to_string(), "");
        assert_eq!(Version::inf().to_string(), "[INF]");
    }

    #[test]
    fn ascending_order() {
        let ascending = [
            "", "0.0.0", "1", "2", "2.alpha1", "2.alpha2", "2.beta", "2.0", "2.0.8.8", "2.1",
            "2.1.0",
        ];
        for pair in ascending.windows(2) {
            assert!(ver(pair[0]) < ver(pair[1]), "{} < {}", pair[0], pair[1]);
        }
        for v in ascending {
            assert!(ver(v) < Version::inf());
        }
    }

    #[test]
    fn shorter_prefix_sorts_first() {
        assert!(ver("1") < ver("1.0"));
        assert!(ver("2.6") < ver("2.6.8"));
        assert!(ver("2.6.8") < ver("2.6").next());
    }

    #[test]
    fn next_versions() {
        assert_eq!(ver("1.2").next(), ver("1.2_"));
        assert!(ver("").next().is_inf());
    }

    #[test]
    fn semver_accessors() {
        let v = ver("2.6.8");
        assert_eq!(v.major().map(|t| t.to_string()), Some("2".to_string()));
        assert_eq!(v.minor().map(|t| t.to_string()), Some("6".to_string()));
        assert_eq!(v.patch().map(|t| t.to_string()), Some("8".to_string()));
        assert_eq!(ver("2").minor(), None);
        assert_eq!(ver("").major(), None);
    }

    #[test]
    fn trim_tokens() {
        assert_eq!(ver("1.2.3").trim(2), ver("1.2"));
        assert_eq!(ver("1.2.3").trim(0), ver(""));
        assert_eq!(ver("1.2.3").trim(5), ver("1.2.3"));
    }

    #[test]
    fn rejects_bad_versions() {
        assert!(Version::parse(".1").is_err());
        assert!(Version::parse("1.").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("1.03").is_err());
        assert!(Version::parse("1.A").is_err());
    }

    #[test]
    fn serde_round_trip() {
        let v = ver("1.2-3");
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"1.2-3\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
