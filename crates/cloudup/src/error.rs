//! Error types shared by the retry envelope, provider adapters and tasks.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = CloudupError> = std::result::Result<T, E>;

/// Errors that can occur while reconciling cloud resources.
#[derive(Error, Debug)]
pub enum CloudupError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Authentication error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A cloud sub-service this call depends on is not provisioned.
    #[error("{0} support not available in this deployment")]
    CapabilityUnavailable(&'static str),

    /// A retry policy or operation poll ran out of attempts.
    #[error("timed out waiting for the condition")]
    WaitTimeout,

    /// The surrounding cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// A required field of the desired configuration is empty.
    #[error("field is required: {0}")]
    RequiredField(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The changeset holds changes the resource kind cannot apply in place.
    #[error("cannot apply changes to {kind}: {changes}")]
    CannotApplyChanges { kind: &'static str, changes: String },

    /// A long-running cloud operation finished with errors.
    #[error("operation {name} failed: {message}")]
    OperationFailed { name: String, message: String },

    /// Terraform rendering failed.
    #[error("Terraform error: {0}")]
    Terraform(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another error with a description of what was being attempted.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<CloudupError>,
    },
}

impl CloudupError {
    /// Wrap this error with a description of the failed action.
    #[must_use]
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through [`CloudupError::Context`] layers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the API reported the resource as absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Self::NotFound(_) | Self::Api { status: 404, .. }
        )
    }

    /// Whether the API reported a version conflict (HTTP 409).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self.root(), Self::Api { status: 409, .. })
    }

    /// Errors that retrying cannot fix.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.root(),
            Self::Auth(_)
                | Self::CapabilityUnavailable(_)
                | Self::Cancelled
                | Self::RequiredField(_)
                | Self::Config(_)
                | Self::CannotApplyChanges { .. }
        )
    }
}

/// Error for a missing required field, e.g. `required_field("Name")`.
#[must_use]
pub fn required_field(field: &str) -> CloudupError {
    CloudupError::RequiredField(field.to_string())
}
