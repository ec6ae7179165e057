//! Payloads exchanged with resolve backends.
//!
//! Batched backend:
//!
//! ```text
//! request  : data={"subjects": {"<subject>": ["<key>", ...]}}
//! response : {"<subject>": {"<key>": <value>, ...}, ...}
//! ```
//!
//! Per-key backend:
//!
//! ```text
//! request  : tokenId=<key>
//! response : [{"fields": {"<name>": <value>}, "ids": [{"idType": .., "idString": ..}]}]
//! ```

use crate::ids::{ResolvedValue, Subject, TempKey};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Body of one batched resolve request.
///
/// Subjects serialize in the order they were first pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(serialize_with = "serialize_subjects", deserialize_with = "deserialize_subjects")]
    pub subjects: Vec<(Subject, Vec<TempKey>)>,
}

impl BatchRequest {
    pub fn push(&mut self, subject: &Subject, key: &TempKey) {
        match self.subjects.iter_mut().find(|(s, _)| s == subject) {
            Some((_, keys)) => keys.push(key.clone()),
            None => self.subjects.push((subject.clone(), vec![key.clone()])),
        }
    }

    /// Total number of keys across all subjects.
    pub fn key_count(&self) -> usize {
        self.subjects.iter().map(|(_, keys)| keys.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.key_count() == 0
    }
}

fn serialize_subjects<S: Serializer>(
    subjects: &[(Subject, Vec<TempKey>)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(subjects.len()))?;
    for (subject, keys) in subjects {
        map.serialize_entry(subject, keys)?;
    }
    map.end()
}

fn deserialize_subjects<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<(Subject, Vec<TempKey>)>, D::Error> {
    struct SubjectsVisitor;

    impl<'de> Visitor<'de> for SubjectsVisitor {
        type Value = Vec<(Subject, Vec<TempKey>)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of subject to temp-ID list")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut subjects = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(entry) = access.next_entry()? {
                subjects.push(entry);
            }
            Ok(subjects)
        }
    }

    deserializer.deserialize_map(SubjectsVisitor)
}

/// Response of a batched resolve request, `subject -> key -> value`.
///
/// Only the requested pairs are ever looked at; entries of any other shape
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct BatchResponse(serde_json::Value);

impl BatchResponse {
    /// A response whose top level is not an object carries no values.
    pub fn is_object(&self) -> bool {
        self.0.is_object()
    }

    pub fn value(&self, subject: &Subject, key: &TempKey) -> Option<&ResolvedValue> {
        self.0.get(subject.as_str()).and_then(|keys| keys.get(key.as_str()))
    }
}

impl From<serde_json::Value> for BatchResponse {
    fn from(payload: serde_json::Value) -> Self {
        Self(payload)
    }
}

/// Typed identifier attached to a patient record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdEntry {
    #[serde(rename = "idType")]
    pub id_type: String,
    #[serde(rename = "idString")]
    pub id_string: String,
}

/// Single record returned by the per-key backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(default)]
    pub fields: serde_json::Map<String, ResolvedValue>,
    #[serde(default)]
    pub ids: Vec<IdEntry>,
}

impl PatientRecord {
    /// Looks up a subject, first as a field name, then as an id type.
    pub fn lookup(&self, subject: &Subject) -> Option<ResolvedValue> {
        if let Some(value) = self.fields.get(subject.as_str()) {
            return Some(value.clone());
        }
        self.ids
            .iter()
            .find(|id| id.id_type == subject.as_str())
            .map(|id| ResolvedValue::String(id.id_string.clone()))
    }
}

/// Error envelope some backends return with HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpErrorEnvelope {
    #[serde(rename = "__HTTP_ERROR__")]
    pub error: HttpErrorDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpErrorDetails {
    #[serde(default)]
    pub msg: String,
    #[serde(rename = "httpStatusCode")]
    pub http_status_code: u16,
    #[serde(rename = "httpStatusMsg", default)]
    pub http_status_msg: String,
}

impl HttpErrorEnvelope {
    /// Extracts the envelope if `payload` is one.
    pub fn detect(payload: &serde_json::Value) -> Option<Self> {
        payload.get("__HTTP_ERROR__")?;
        serde_json::from_value(payload.clone()).ok()
    }
}
