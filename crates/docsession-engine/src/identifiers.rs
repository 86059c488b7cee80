//! Style identifier synthesis.
//!
//! Display names chosen by users ("My Heading", "Überschrift 1") cannot be
//! used as style identifiers directly: the document namespace only accepts
//! NCName-safe strings. [`synthesize`] escapes a display name into that
//! grammar and [`decode`] reverses it. [`unique_within`] then salts and
//! disambiguates a synthesized name so it never collides with an identifier
//! that already exists in a namespace.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;

/// Marker written for the empty display name.
const EMPTY_MARKER: &str = "_";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("no free identifier left for `{candidate}` in the style namespace")]
    NamespaceExhausted { candidate: String },
}

/// A set of identifiers that are already taken.
pub trait StyleNamespace {
    fn contains_id(&self, id: &str) -> bool;
}

impl StyleNamespace for HashSet<String> {
    fn contains_id(&self, id: &str) -> bool {
        self.contains(id)
    }
}

impl StyleNamespace for BTreeSet<String> {
    fn contains_id(&self, id: &str) -> bool {
        self.contains(id)
    }
}

impl StyleNamespace for [&str] {
    fn contains_id(&self, id: &str) -> bool {
        self.iter().any(|taken| *taken == id)
    }
}

impl<F> StyleNamespace for F
where
    F: Fn(&str) -> bool,
{
    fn contains_id(&self, id: &str) -> bool {
        self(id)
    }
}

fn is_literal(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-'
}

fn push_escaped(out: &mut String, byte: u8) {
    // Writing into a String cannot fail.
    let _ = write!(out, "_{byte:02x}_");
}

/// Escape a display name into an NCName-safe identifier.
///
/// ASCII letters, digits, `.` and `-` are kept; every other UTF-8 byte is
/// written as `_hh_`. The first character is escaped too unless it is a
/// letter, so the result always starts with a letter or `_`.
pub fn synthesize(name: &str) -> String {
    if name.is_empty() {
        return EMPTY_MARKER.to_string();
    }

    let mut out = String::with_capacity(name.len());
    for (index, byte) in name.bytes().enumerate() {
        let leading_ok = index > 0 || byte.is_ascii_alphabetic();
        if is_literal(byte) && leading_ok {
            out.push(byte as char);
        } else {
            push_escaped(&mut out, byte);
        }
    }
    out
}

/// Reverse [`synthesize`]. Returns `None` for strings it could not have produced.
pub fn decode(id: &str) -> Option<String> {
    if id == EMPTY_MARKER {
        return Some(String::new());
    }

    let bytes = id.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];
        if byte == b'_' {
            let escape = bytes.get(index + 1..index + 4)?;
            if escape[2] != b'_' {
                return None;
            }
            let hex = std::str::from_utf8(&escape[..2]).ok()?;
            if !hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
                return None;
            }
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            index += 4;
        } else if is_literal(byte) && (index > 0 || byte.is_ascii_alphabetic()) {
            decoded.push(byte);
            index += 1;
        } else {
            return None;
        }
    }

    let decoded = String::from_utf8(decoded).ok()?;
    (synthesize(&decoded) == id).then_some(decoded)
}

/// Salt `candidate` and disambiguate it until it is absent from `namespace`.
///
/// The first attempt is `{candidate}_{salt}`; after that the numeric
/// disambiguator counts up from zero: `{candidate}_{i}_{salt}`.
pub fn unique_within<N>(namespace: &N, candidate: &str, salt: &str) -> Result<String, IdentifierError>
where
    N: StyleNamespace + ?Sized,
{
    let first = format!("{candidate}_{salt}");
    if !namespace.contains_id(&first) {
        return Ok(first);
    }

    let mut disambiguator: u64 = 0;
    loop {
        let attempt = format!("{candidate}_{disambiguator}_{salt}");
        if !namespace.contains_id(&attempt) {
            return Ok(attempt);
        }
        disambiguator =
            disambiguator
                .checked_add(1)
                .ok_or_else(|| IdentifierError::NamespaceExhausted {
                    candidate: candidate.to_string(),
                })?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Heading1", "Heading1")]
    #[case("My Heading", "My_20_Heading")]
    #[case("2nd", "_32_nd")]
    #[case("-dash", "_2d_dash")]
    #[case("snake_case", "snake_5f_case")]
    #[case("a.b-c", "a.b-c")]
    #[case("", "_")]
    fn test_synthesize(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(synthesize(name), expected);
    }

    #[test]
    fn test_synthesize_multibyte_escapes_each_byte() {
        insta::assert_snapshot!(synthesize("Überschrift"), @"_c3__9c_berschrift");
    }

    #[rstest]
    #[case("My Heading")]
    #[case("")]
    #[case("_")]
    #[case("a_20_b")]
    #[case("9 lives")]
    #[case("Überschrift 1")]
    #[case("Title: \"quoted\"")]
    fn test_decode_inverts_synthesize(#[case] name: &str) {
        assert_eq!(decode(&synthesize(name)).as_deref(), Some(name));
    }

    #[test]
    fn test_distinct_names_never_collide() {
        // `_` is escaped, so names that look like escape sequences stay distinct
        let names = ["a b", "a_20_b", "a_b", "a__b", "_", "", "__"];
        let ids: HashSet<String> = names.iter().map(|n| synthesize(n)).collect();
        assert_eq!(ids.len(), names.len());
    }

    #[rstest]
    #[case("1abc")]
    #[case("a_zz_b")]
    #[case("a b")]
    #[case("_20")]
    fn test_decode_rejects_foreign_strings(#[case] id: &str) {
        assert_eq!(decode(id), None);
    }

    #[test]
    fn test_synthesized_ids_start_with_letter_or_underscore() {
        for name in ["", "1", ".", "-", " ", "x", "Ω"] {
            let first = synthesize(name).chars().next().unwrap();
            assert!(first.is_ascii_alphabetic() || first == '_', "{name:?}");
        }
    }

    #[test]
    fn test_unique_within_prefers_unsuffixed_name() {
        let namespace: HashSet<String> = HashSet::new();
        let id = unique_within(&namespace, "MyHeading", "member0").unwrap();
        assert_eq!(id, "MyHeading_member0");
    }

    #[test]
    fn test_unique_within_counts_up_from_zero() {
        let namespace: BTreeSet<String> = ["MyHeading_member0", "MyHeading_0_member0"]
            .into_iter()
            .map(String::from)
            .collect();
        let id = unique_within(&namespace, "MyHeading", "member0").unwrap();
        assert_eq!(id, "MyHeading_1_member0");
        assert!(!namespace.contains(&id));
    }

    #[test]
    fn test_unique_within_is_stable_without_namespace_update() {
        let namespace: HashSet<String> = ["H_m".to_string()].into();
        let first = unique_within(&namespace, "H", "m").unwrap();
        let second = unique_within(&namespace, "H", "m").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unique_within_accepts_closures_and_slices() {
        let taken: &[&str] = &["s_m"];
        assert_eq!(unique_within(taken, "s", "m").unwrap(), "s_0_m");

        let everything_below_five = |id: &str| {
            id == "s_m"
                || id
                    .strip_prefix("s_")
                    .and_then(|rest| rest.strip_suffix("_m"))
                    .and_then(|n| n.parse::<u64>().ok())
                    .is_some_and(|n| n < 5)
        };
        assert_eq!(unique_within(&everything_below_five, "s", "m").unwrap(), "s_5_m");
    }
}
