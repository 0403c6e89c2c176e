//! Core error types.

use thiserror::Error;

/// Core modelry errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// No registered entity type matches the given name.
    #[error("model \"{0}\" not found")]
    ModelNotFound(String),

    /// The entity type has no attribute with the given name.
    #[error("{entity} has no attribute \"{attribute}\"")]
    UnknownAttribute {
        /// Entity type name.
        entity: String,
        /// Requested attribute name.
        attribute: String,
    },

    /// The declared schema is inconsistent.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A value could not be converted to the attribute's declared type.
    #[error("invalid value for {attribute}: {message}")]
    InvalidValue {
        /// Attribute name.
        attribute: String,
        /// What went wrong.
        message: String,
    },

    /// A `attr=value` assignment list could not be parsed.
    #[error("invalid assignment \"{0}\", expected attr=value")]
    InvalidAssignment(String),

    /// A named template slot has no value in the substitution context.
    #[error("undefined template slot \"{0}\"")]
    UndefinedSlot(String),

    /// The template contains a malformed placeholder.
    #[error("invalid template at offset {offset}: {message}")]
    InvalidTemplate {
        /// Byte offset of the offending placeholder.
        offset: usize,
        /// What went wrong.
        message: String,
    },

    /// The operation needs a persisted instance.
    #[error("{0} instance has no identity, save it first")]
    NotPersisted(String),

    /// The prompt collaborator failed.
    #[error("prompt error: {0}")]
    Prompt(String),

    /// The user interrupted an interactive prompt.
    #[error("interrupted")]
    Interrupted,

    /// Translation catalog error.
    #[error("translation error: {0}")]
    Translation(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::UnknownAttribute`].
    pub fn unknown_attribute(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Error::UnknownAttribute {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    /// Shorthand for [`Error::InvalidValue`].
    pub fn invalid_value(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidValue {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
