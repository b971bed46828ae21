use miette::Diagnostic;
use thiserror::Error;

/// Error raised for malformed version, range or requirement text.
///
/// Parse failures are always local and immediate; nothing in this crate
/// retries or defers them.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum VersionError {
    /// A single version token could not be parsed.
    #[error("invalid version token '{token}': {reason}")]
    Token { token: String, reason: String },

    /// A version string could not be parsed.
    #[error("invalid version '{text}': {reason}")]
    Version { text: String, reason: String },

    /// A version range string could not be parsed.
    #[error("syntax error in version range '{text}': {reason}")]
    #[diagnostic(help("ranges look like '1.2', '1.2+', '1.2+<2', '==1.2.3', '<2' or unions thereof ('1|2+')"))]
    Range { text: String, reason: String },

    /// A requirement string could not be parsed.
    #[error("invalid requirement '{text}': {reason}")]
    Requirement { text: String, reason: String },
}

impl VersionError {
    pub(crate) fn token(token: impl Into<String>, reason: impl Into<String>) -> Self {
        VersionError::Token {
            token: token.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn version(text: impl Into<String>, reason: impl Into<String>) -> Self {
        VersionError::Version {
            text: text.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn range(text: impl Into<String>, reason: impl Into<String>) -> Self {
        VersionError::Range {
            text: text.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn requirement(text: impl Into<String>, reason: impl Into<String>) -> Self {
        VersionError::Requirement {
            text: text.into(),
            reason: reason.into(),
        }
    }
}
