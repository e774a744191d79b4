//! Optimistic concurrency token.
//!
//! A version is base64 of the JSON array `[seq_no, primary_term]`. These
//! functions are its only producer and consumer.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use saved_objects_sdk::SavedObjectsError;
use serde_json::Value;

/// Store write preconditions derived from a version token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionPreconditions {
    pub if_seq_no: i64,
    pub if_primary_term: i64,
}

#[must_use]
pub fn encode_version(seq_no: i64, primary_term: i64) -> String {
    STANDARD.encode(format!("[{seq_no},{primary_term}]"))
}

/// Encodes a version only when the store reported both halves.
#[must_use]
pub fn encode_hit_version(seq_no: Option<i64>, primary_term: Option<i64>) -> Option<String> {
    Some(encode_version(seq_no?, primary_term?))
}

/// Decodes a version token into `(seq_no, primary_term)`.
///
/// # Errors
///
/// Returns `BadRequest` unless the token decodes to exactly two
/// non-negative integers.
pub fn decode_version(version: &str) -> Result<(i64, i64), SavedObjectsError> {
    let invalid = || SavedObjectsError::bad_request(format!("Invalid version [{version}]"));
    let bytes = STANDARD.decode(version).map_err(|_| invalid())?;
    let parsed: Vec<Value> = serde_json::from_slice(&bytes).map_err(|_| invalid())?;
    match parsed.as_slice() {
        [seq_no, primary_term] => {
            let seq_no = seq_no.as_i64().filter(|n| *n >= 0).ok_or_else(invalid)?;
            let primary_term = primary_term.as_i64().filter(|n| *n >= 0).ok_or_else(invalid)?;
            Ok((seq_no, primary_term))
        }
        _ => Err(invalid()),
    }
}

/// Preconditions for a write, or `None` for last-write-wins.
///
/// # Errors
///
/// Returns `BadRequest` for an undecodable token.
pub fn expected_version_properties(
    version: Option<&str>,
) -> Result<Option<VersionPreconditions>, SavedObjectsError> {
    version
        .map(|version| {
            decode_version(version).map(|(if_seq_no, if_primary_term)| VersionPreconditions {
                if_seq_no,
                if_primary_term,
            })
        })
        .transpose()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn known_encoding_is_stable() {
        assert_eq!(encode_version(1, 1), "WzEsMV0=");
        assert_eq!(decode_version("WzEsMV0=").unwrap(), (1, 1));
    }

    #[test]
    fn round_trip_preserves_pairs_and_distinguishes_them() {
        let pairs = [(0, 1), (1, 1), (1, 2), (2, 1), (99, 7), (i64::MAX, 1), (42, i64::MAX)];
        let mut seen = HashSet::new();
        for (seq_no, primary_term) in pairs {
            let token = encode_version(seq_no, primary_term);
            assert_eq!(decode_version(&token).unwrap(), (seq_no, primary_term));
            assert!(seen.insert(token), "duplicate token for ({seq_no}, {primary_term})");
        }
    }

    #[test]
    fn malformed_tokens_are_bad_requests() {
        let not_base64 = "%%%";
        let not_json = STANDARD.encode("hello");
        let wrong_arity = STANDARD.encode("[1,2,3]");
        let not_integers = STANDARD.encode("[\"a\",1]");
        let negative = STANDARD.encode("[-1,1]");
        for token in [
            not_base64,
            not_json.as_str(),
            wrong_arity.as_str(),
            not_integers.as_str(),
            negative.as_str(),
        ] {
            let err = decode_version(token).unwrap_err();
            assert!(err.is_bad_request(), "{token}");
            assert_eq!(err.to_string(), format!("Invalid version [{token}]"));
        }
    }

    #[test]
    fn missing_version_means_no_preconditions() {
        assert_eq!(expected_version_properties(None).unwrap(), None);
        assert_eq!(
            expected_version_properties(Some(&encode_version(5, 2))).unwrap(),
            Some(VersionPreconditions {
                if_seq_no: 5,
                if_primary_term: 2
            })
        );
        assert_eq!(encode_hit_version(Some(1), None), None);
    }
}
