//! Version token parsing and ordering.

use std::fmt;

use crate::error::VersionError;

/// One segment of a token: a run of letters/underscores or a run of digits.
///
/// Alphabetic subtokens always order before numeric ones, so `beta` < `1`
/// and `gamma33` < `33gamma`. Alphabetic comparison is bytewise (`_` sorts
/// before `a`..`z`); numeric comparison is numeric. Zero padding is rejected
/// at parse time, so no padding tie-break exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum SubToken {
    Alphabetic(String),
    Numeric(u64),
}

impl fmt::Display for SubToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubToken::Alphabetic(s) => f.write_str(s),
            SubToken::Numeric(n) => write!(f, "{n}"),
        }
    }
}

/// Token within a version number.
///
/// A token is the part of a version number that appears between delimiters,
/// e.g. the version `2.3.7b` contains the tokens `2`, `3` and `7b`. Tokens
/// may contain lowercase letters, digits and underscores; in practice almost
/// every token is a plain number or a single letter, and the underscore
/// appears only in the "next version" sentinel produced by [`next`].
///
/// [`next`]: VersionToken::next
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionToken {
    subtokens: Vec<SubToken>,
}

impl VersionToken {
    /// Parse a token string, e.g. `"7"`, `"b"` or `"alpha3"`.
    pub fn parse(token: &str) -> Result<VersionToken, VersionError> {
        if token.is_empty() {
            return Err(VersionError::token(token, "empty token"));
        }

        let mut subtokens = Vec::new();
        let mut run = String::new();
        let mut run_is_digits = false;

        for ch in token.chars() {
            let is_digit = ch.is_ascii_digit();
            if !is_digit && !ch.is_ascii_lowercase() && ch != '_' {
                return Err(VersionError::token(
                    token,
                    format!("unexpected character '{ch}'"),
                ));
            }
            if !run.is_empty() && is_digit != run_is_digits {
                subtokens.push(Self::close_run(token, &run, run_is_digits)?);
                run.clear();
            }
            run_is_digits = is_digit;
            run.push(ch);
        }
        subtokens.push(Self::close_run(token, &run, run_is_digits)?);

        Ok(VersionToken { subtokens })
    }

    fn close_run(token: &str, run: &str, is_digits: bool) -> Result<SubToken, VersionError> {
        if !is_digits {
            return Ok(SubToken::Alphabetic(run.to_string()));
        }
        if run.len() > 1 && run.starts_with('0') {
            return Err(VersionError::token(token, "zero-padded numeric token"));
        }
        let n: u64 = run
            .parse()
            .map_err(|_| VersionError::token(token, "numeric component out of range"))?;
        Ok(SubToken::Numeric(n))
    }

    /// True for the plain numeric token `0`.
    pub(crate) fn is_zero(&self) -> bool {
        self.subtokens == [SubToken::Numeric(0)]
    }

    /// The next largest token.
    ///
    /// The result is greater than this token and greater than any token that
    /// extends it, e.g. `next("5")` is `5_`, which sorts above `5` but below
    /// `6`.
    pub fn next(&self) -> VersionToken {
        let mut subtokens = self.subtokens.clone();
        match subtokens.last_mut() {
            Some(SubToken::Alphabetic(s)) => s.push('_'),
            _ => subtokens.push(SubToken::Alphabetic("_".to_string())),
        }
        VersionToken { subtokens }
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sub in &self.subtokens {
            write!(f, "{sub}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(s: &str) -> VersionToken {
        VersionToken::parse(s).unwrap()
    }

    #[test]
    fn numeric_ordering() {
        assert!(tok("3") < tok("4"));
        assert!(tok("9") < tok("10"));
    }

    #[test]
    fn alphas_before_numbers() {
        assert!(tok("beta") < tok("1"));
        assert!(tok("gamma33") < tok("33gamma"));
    }

    #[test]
    fn alpha_ordering() {
        assert!(tok("alpha3") < tok("alpha4"));
        assert!(tok("alpha") < tok("alpha3"));
        assert!(tok("a") < tok("b"));
    }

    #[test]
    fn underscore_sorts_below_letters() {
        assert!(tok("_") < tok("a"));
    }

    #[test]
    fn next_is_tight_upper_bound() {
        assert_eq!(tok("5").next(), tok("5_"));
        assert!(tok("5") < tok("5").next());
        assert!(tok("5").next() < tok("6"));
        assert_eq!(tok("alpha").next().to_string(), "alpha_");
    }

    #[test]
    fn rejects_bad_tokens() {
        assert!(VersionToken::parse("").is_err());
        assert!(VersionToken::parse("03").is_err());
        assert!(VersionToken::parse("1A").is_err());
        assert!(VersionToken::parse("1.2").is_err());
        assert!(VersionToken::parse("ä").is_err());
    }

    #[test]
    fn zero_alone_is_fine() {
        assert_eq!(tok("0").to_string(), "0");
    }

    #[test]
    fn display_round_trip() {
        for s in ["0", "12", "alpha3", "3_", "beta"] {
            assert_eq!(tok(s).to_string(), s);
        }
    }
}
