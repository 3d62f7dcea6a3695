//! Payload predicate evaluation for query filters.
//!
//! Conjunctive equality filters compare with Integer/Float unified
//! numerically; a missing field never matches.

use crate::record::{Payload, PayloadValue};

/// True when every `(field, value)` pair matches the payload.
pub fn matches_equality(payload: &Payload, filters: &[(String, PayloadValue)]) -> bool {
    filters.iter().all(|(field, expected)| {
        payload
            .get(field)
            .is_some_and(|actual| actual.loose_eq(expected))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pairs: Vec<(&str, PayloadValue)>) -> Payload {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn filters(pairs: Vec<(&str, PayloadValue)>) -> Vec<(String, PayloadValue)> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let p = payload(vec![("any", PayloadValue::String("value".into()))]);
        assert!(matches_equality(&p, &[]));
    }

    #[test]
    fn test_conjunction() {
        let p = payload(vec![
            ("color", PayloadValue::String("red".into())),
            ("size", PayloadValue::Integer(5)),
        ]);
        assert!(matches_equality(
            &p,
            &filters(vec![
                ("color", PayloadValue::String("red".into())),
                ("size", PayloadValue::Integer(5)),
            ])
        ));
        assert!(!matches_equality(
            &p,
            &filters(vec![
                ("color", PayloadValue::String("red".into())),
                ("size", PayloadValue::Integer(6)),
            ])
        ));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let p = payload(vec![]);
        assert!(!matches_equality(
            &p,
            &filters(vec![("missing", PayloadValue::Null)])
        ));
    }

    #[test]
    fn test_numeric_unification() {
        let p = payload(vec![("score", PayloadValue::Float(3.0))]);
        assert!(matches_equality(
            &p,
            &filters(vec![("score", PayloadValue::Integer(3))])
        ));
    }
}
