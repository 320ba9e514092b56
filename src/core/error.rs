use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Unsupported view descriptor: {0}")]
    UnsupportedDescriptor(String),

    #[error("View for view descriptor {0} not found")]
    NotFound(String),

    #[error("View name {0} is already registered with a different descriptor")]
    ViewNameConflict(String),

    #[error("Invalid view descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    #[error("Invalid value {value} for measurement {name}")]
    InvalidMeasurement { name: String, value: f64 },

    #[error("Event queue is closed")]
    QueueClosed,

    #[error("Timeout error: queue did not drain within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for stats operations
pub type Result<T> = std::result::Result<T, StatsError>;

impl StatsError {
    /// Creates a new unsupported-descriptor error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedDescriptor(msg.into())
    }

    /// Creates a new not-found error
    pub fn not_found<S: Into<String>>(view_name: S) -> Self {
        Self::NotFound(view_name.into())
    }

    /// Creates a new invalid-descriptor error
    pub fn invalid_descriptor<S: Into<String>>(msg: S) -> Self {
        Self::InvalidDescriptor(msg.into())
    }

    /// Creates a new invalid-tag error
    pub fn invalid_tag<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTag(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if the error was raised while applying a queued entry
    /// rather than on the caller's thread.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::InvalidMeasurement { .. })
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnsupportedDescriptor(_) | Self::ViewNameConflict(_) => "registration",
            Self::NotFound(_) => "not_found",
            Self::InvalidDescriptor(_) | Self::InvalidTag(_) | Self::InvalidMeasurement { .. } => {
                "validation"
            },
            Self::QueueClosed => "queue",
            Self::Timeout { .. } => "timeout",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}
