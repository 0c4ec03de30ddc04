use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A business record that fulfils an action item (an AE report, a death
/// report, ...). Only the linkage columns matter to the workflow; the rest
/// of the record travels in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub reference_model: String,
    pub identifier: Uuid,
    pub subject_identifier: String,
    /// Filled in on first save if the caller did not supply one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_action_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_action_identifier: Option<String>,
    pub report_datetime: DateTime<Utc>,
    #[serde(default)]
    pub fields: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reference {
    pub fn new(reference_model: impl Into<String>, subject_identifier: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            reference_model: reference_model.into(),
            identifier: Uuid::new_v4(),
            subject_identifier: subject_identifier.into(),
            action_identifier: None,
            parent_action_identifier: None,
            related_action_identifier: None,
            report_datetime: now,
            fields: serde_json::Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_action_identifier(mut self, action_identifier: impl Into<String>) -> Self {
        self.action_identifier = Some(action_identifier.into());
        self
    }

    pub fn with_related(mut self, action_identifier: impl Into<String>) -> Self {
        self.related_action_identifier = Some(action_identifier.into());
        self
    }

    pub fn with_parent(mut self, action_identifier: impl Into<String>) -> Self {
        self.parent_action_identifier = Some(action_identifier.into());
        self
    }
}

/// Subject identifier lookup table. Owned by enrolment in a full system;
/// here it only answers "does this subject exist".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredSubject {
    pub subject_identifier: String,
    pub registered_at: DateTime<Utc>,
}

impl RegisteredSubject {
    pub fn new(subject_identifier: impl Into<String>) -> Self {
        Self {
            subject_identifier: subject_identifier.into(),
            registered_at: Utc::now(),
        }
    }
}
