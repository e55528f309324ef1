//! Enriched anchor message construction
//!
//! Builds the payload that gets hashed and anchored: identifiers, a
//! heuristic classification of the record title, symptom keywords pulled
//! from the notes, the treatment list split out of the prescription text,
//! a schema version tag, and a timestamp.
//!
//! Pure aside from the wall clock. Missing optional fields degrade to
//! empty containers, never an error.

use crate::types::{AnchorMessage, EntityType, RecordSnapshot};
use chrono::Utc;

/// Anchor payload schema version
pub const SCHEMA_VERSION: &str = "2.0";

/// Classification rules, in priority order. First matching rule wins;
/// matching is case-insensitive substring search over the title.
const CLASSIFICATION_RULES: &[(&str, &[&str])] = &[
    ("cardiology", &["cardio", "cardiac", "heart", "ecg", "arrhythmia"]),
    ("emergency", &["emergency", "urgent", "trauma", "accident"]),
    ("vaccination", &["vaccin", "immuniz", "booster"]),
];

/// Fallback label when no rule matches
const DEFAULT_CLASSIFICATION: &str = "general";

/// Fixed symptom vocabulary matched as substrings against the notes
const SYMPTOM_VOCABULARY: &[&str] = &[
    "fever",
    "cough",
    "headache",
    "fatigue",
    "nausea",
    "chest pain",
    "dizziness",
    "shortness of breath",
    "sore throat",
    "vomiting",
    "rash",
    "palpitations",
];

/// Classify a record title
pub fn classify_title(title: &str) -> &'static str {
    let lowered = title.to_lowercase();
    for (label, keywords) in CLASSIFICATION_RULES {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return label;
        }
    }
    DEFAULT_CLASSIFICATION
}

/// Extract symptom keywords present in the notes
pub fn extract_symptoms(notes: &str) -> Vec<String> {
    let lowered = notes.to_lowercase();
    SYMPTOM_VOCABULARY
        .iter()
        .filter(|symptom| lowered.contains(*symptom))
        .map(|s| s.to_string())
        .collect()
}

/// Split the prescription free text into individual treatments
pub fn extract_treatments(prescription: &str) -> Vec<String> {
    prescription
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds enriched anchor messages from domain snapshots
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder;

impl MessageBuilder {
    /// Create a builder
    pub fn new() -> Self {
        Self
    }

    /// Build the enriched payload for one entity version
    pub fn build(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        snapshot: &RecordSnapshot,
        content_hash: &str,
    ) -> AnchorMessage {
        let classification = snapshot
            .title
            .as_deref()
            .map(classify_title)
            .unwrap_or(DEFAULT_CLASSIFICATION)
            .to_string();

        let symptoms = snapshot
            .notes
            .as_deref()
            .map(extract_symptoms)
            .unwrap_or_default();

        let treatments = snapshot
            .prescription
            .as_deref()
            .map(extract_treatments)
            .unwrap_or_default();

        let participants = [&snapshot.patient_id, &snapshot.practitioner_id]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        AnchorMessage {
            version: SCHEMA_VERSION.to_string(),
            entity_type,
            entity_id: entity_id.to_string(),
            content_hash: content_hash.to_string(),
            classification,
            symptoms,
            treatments,
            vitals: snapshot.vitals.clone(),
            participants,
            anchored_at: Utc::now(),
        }
    }
}
