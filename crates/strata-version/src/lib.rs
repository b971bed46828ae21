//! A well defined versioning schema: tokens, versions, version ranges and
//! requirements.
//!
//! A [`Version`] is a sequence of zero or more [`VersionToken`]s separated by
//! `.` or `-` (the separators are cosmetic: `1.2` equals `1-2`). The empty
//! version denotes an unversioned object and is the smallest possible
//! version.
//!
//! A [`VersionRange`] is a set of one or more contiguous ranges of versions,
//! for example `3+<5` contains any version at least `3` but below `5`.
//! Ranges can be unioned, intersected and inverted, and have a stable
//! textual grammar used both for construction and serialization.
//!
//! A [`Requirement`] binds a package name to a range, optionally as a
//! conflict (`!foo-2`) or weak reference (`~foo-1`), and a
//! [`RequirementList`] reduces a flat list of requirements to one effective
//! requirement per package name, detecting unsatisfiable combinations.

pub mod error;
pub mod range;
pub mod requirement;
pub mod token;
pub mod version;

pub use error::VersionError;
pub use range::{RangeOp, VersionRange};
pub use requirement::{Requirement, RequirementList, VersionedObject};
pub use token::VersionToken;
pub use version::Version;
