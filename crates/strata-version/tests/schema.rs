//! Ordering properties of the version schema, checked over generated input.

use std::cmp::Ordering;

use strata_version::{Version, VersionRange, VersionToken};

/// Tiny deterministic generator so runs are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn random_token(rng: &mut Lcg) -> VersionToken {
    loop {
        let len = 1 + rng.below(6) as usize;
        let s: String = (0..len)
            .map(|_| CHARS[rng.below(CHARS.len() as u64) as usize] as char)
            .collect();
        // zero-padded numerics are rejected by the grammar; try again
        if let Ok(token) = VersionToken::parse(&s) {
            return token;
        }
    }
}

fn random_version(rng: &mut Lcg) -> Version {
    loop {
        let ntokens = rng.below(5) as usize;
        let text = (0..ntokens)
            .map(|_| random_token(rng).to_string())
            .collect::<Vec<_>>()
            .join(".");
        if let Ok(version) = Version::parse(&text) {
            return version;
        }
    }
}

fn assert_strict_weak_ordering<T: Ord + std::fmt::Display>(a: &T, b: &T) {
    let eq = a == b;
    let lt = a < b;
    let gt = a > b;
    let lte = a <= b;
    let gte = a >= b;

    assert_eq!(eq, !(a != b), "{a} vs {b}");
    if eq {
        assert!(!lt && !gt && lte && gte, "{a} vs {b}");
    } else {
        assert_ne!(lt, gt, "{a} vs {b}");
        assert_ne!(lte, gte, "{a} vs {b}");
        assert_eq!(lt, lte, "{a} vs {b}");
        assert_eq!(gt, gte, "{a} vs {b}");
    }
}

#[test]
fn token_strict_weak_ordering() {
    let mut rng = Lcg(7);
    let tok = random_token(&mut rng);
    assert_strict_weak_ordering(&tok, &tok.clone());

    for _ in 0..200 {
        let a = random_token(&mut rng);
        let b = random_token(&mut rng);
        assert_strict_weak_ordering(&a, &b);
    }
}

#[test]
fn version_strict_weak_ordering() {
    let mut rng = Lcg(11);
    let ver = random_version(&mut rng);
    assert_strict_weak_ordering(&ver, &ver.clone());

    for _ in 0..200 {
        let a = random_version(&mut rng);
        let b = random_version(&mut rng);
        assert_strict_weak_ordering(&a, &b);
    }
}

#[test]
fn ordering_is_transitive_on_sorted_sample() {
    let mut rng = Lcg(13);
    let mut versions: Vec<Version> = (0..60).map(|_| random_version(&mut rng)).collect();
    versions.sort();
    for window in versions.windows(2) {
        assert!(window[0].cmp(&window[1]) != Ordering::Greater);
    }
}

#[test]
fn parsed_ranges_round_trip_through_display() {
    let mut rng = Lcg(17);
    for _ in 0..100 {
        let a = random_version(&mut rng);
        let b = random_version(&mut rng);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let text = if lo == hi {
            format!("=={lo}")
        } else {
            format!("{lo}..{hi}")
        };
        let range = VersionRange::parse(&text).unwrap();
        assert_eq!(VersionRange::parse(&range.to_string()).unwrap(), range);
    }
}

#[test]
fn range_algebra_identities() {
    let cases = ["3", "3+", "<3", "2+<4", "4|6+", "==2", "2.6"];
    for s in cases {
        let r = VersionRange::parse(s).unwrap();
        // double inverse is identity
        let inv = r.inverse().unwrap();
        assert_eq!(inv.inverse(), Some(r.clone()), "~~{s}");
        // a range and its inverse partition version-space
        assert_eq!(r.union(&inv), VersionRange::any(), "{s} | ~{s}");
        assert_eq!(r.intersection(&inv), None, "{s} & ~{s}");
        // self-identities
        assert_eq!(r.union(&r), r, "{s} | {s}");
        assert_eq!(r.intersection(&r), Some(r.clone()), "{s} & {s}");
        assert!(r.is_superset(&r));
    }
}
