//! QR payload derivation.
//!
//! The payload is the record minus its photo, as canonical JSON. It is
//! recomputed on every render so the code always matches what is shown.

use serde::Serialize;

use crate::hashing::{canonical_json, sha256_hex};
use crate::record::StudentRecord;

/// Photo-free projection of a [`StudentRecord`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload<'a> {
    pub name: &'a str,
    pub roll_number: &'a str,
    pub class_and_division: &'a str,
    pub allergies: &'a [String],
    pub rack_number: &'a str,
    pub bus_route_number: &'a str,
}

impl<'a> From<&'a StudentRecord> for QrPayload<'a> {
    fn from(record: &'a StudentRecord) -> Self {
        Self {
            name: record.name(),
            roll_number: record.roll_number(),
            class_and_division: record.class_and_division(),
            allergies: record.allergies(),
            rack_number: record.rack_number(),
            bus_route_number: record.bus_route_number(),
        }
    }
}

/// Canonical JSON text of the non-photo fields.
pub fn derive_payload(record: &StudentRecord) -> String {
    // Only strings and string arrays: serialization cannot fail.
    canonical_json(&QrPayload::from(record)).unwrap_or_default()
}

/// SHA-256 of the derived payload.
pub fn payload_fingerprint(record: &StudentRecord) -> String {
    sha256_hex(derive_payload(record).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawStudentInput;
    use crate::validation::Validator;

    fn record(photo: &str, allergies: &[&str]) -> StudentRecord {
        Validator::new()
            .validate(&RawStudentInput {
                name: "Ada Lovelace".into(),
                roll_number: "2023001".into(),
                class_and_division: "5-B".into(),
                allergies: allergies.iter().map(|a| a.to_string()).collect(),
                rack_number: "R-101".into(),
                bus_route_number: "Route 3: East Campus".into(),
                photo: photo.into(),
            })
            .unwrap()
    }

    #[test]
    fn test_payload_is_sorted_json_without_photo() {
        let payload = derive_payload(&record("data:image/png;base64,QUJDREVGRw==", &["dairy"]));
        assert_eq!(
            payload,
            r#"{"allergies":["dairy"],"busRouteNumber":"Route 3: East Campus","classAndDivision":"5-B","name":"Ada Lovelace","rackNumber":"R-101","rollNumber":"2023001"}"#
        );
        assert!(!payload.contains("photo"));
        assert!(!payload.contains("QUJDREVGRw=="));
    }

    #[test]
    fn test_payload_keeps_empty_allergies() {
        let payload = derive_payload(&record("data:image/png;base64,AAAA", &[]));
        assert!(payload.contains(r#""allergies":[]"#));
    }

    #[test]
    fn test_payload_stable_across_calls() {
        let r = record("data:image/png;base64,AAAA", &["eggs", "gluten"]);
        assert_eq!(derive_payload(&r), derive_payload(&r.clone()));
        assert_eq!(payload_fingerprint(&r), payload_fingerprint(&r));
    }

    #[test]
    fn test_fingerprint_ignores_photo() {
        let a = record("data:image/png;base64,AAAA", &[]);
        let b = record("data:image/png;base64,BBBB", &[]);
        assert_eq!(payload_fingerprint(&a), payload_fingerprint(&b));
    }
}
