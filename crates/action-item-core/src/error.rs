use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("not initialized: run 'action-item init'")]
    NotInitialized,

    #[error("action item {action_identifier} belongs to '{found}', not '{expected}'")]
    ActionMismatch {
        action_identifier: String,
        expected: String,
        found: String,
    },

    #[error("action item {action_identifier} belongs to subject {found}, not {expected}")]
    SubjectMismatch {
        action_identifier: String,
        expected: String,
        found: String,
    },

    #[error("action not registered: {0}")]
    ActionNotRegistered(String),

    #[error("action already registered: {0}")]
    AlreadyRegistered(String),

    #[error("invalid registration for '{name}': {reason}")]
    InvalidRegistration { name: String, reason: String },

    #[error("singleton action '{action}' already has an action item for subject {subject_identifier}")]
    SingletonViolation {
        action: String,
        subject_identifier: String,
    },

    #[error("action '{action}' requires a related action item ({related_reference_model})")]
    MissingRelatedActionItem {
        action: String,
        related_reference_model: String,
    },

    #[error("subject not found: {0}")]
    SubjectNotFound(String),

    #[error("subject already registered: {0}")]
    SubjectExists(String),

    #[error("action item not found: {0}")]
    ActionItemNotFound(String),

    #[error("action item already exists: {0}")]
    ActionItemExists(String),

    #[error("unable to delete action item {action_identifier}: {reason}")]
    ActionItemDelete {
        action_identifier: String,
        reason: String,
    },

    #[error("action '{action}' does not accept parent '{parent}' (expected one of: {allowed})")]
    InvalidParent {
        action: String,
        parent: String,
        allowed: String,
    },

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("action '{0}' cannot be created by a user")]
    NotCreatableByUser(String),

    #[error("action item {action_identifier} is already linked to reference {reference}")]
    AlreadyLinked {
        action_identifier: String,
        reference: String,
    },

    #[error("reference not found: {model} {identifier}")]
    ReferenceNotFound { model: String, identifier: String },

    #[error("invalid name '{0}': must be lowercase alphanumeric with underscores or hyphens")]
    InvalidName(String),

    #[error("invalid subject identifier '{0}'")]
    InvalidSubjectIdentifier(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    #[error("notification error: {0}")]
    Notification(String),

    #[error("database error: {0}")]
    Db(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ActionError>;
