//! Error types and result definitions.
//!
//! [`OrmError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail and source, and the call site that created it.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use bqorm_config::shared::ValidationError as ConfigValidationError;

/// Result type used throughout the crate.
pub type OrmResult<T> = Result<T, OrmError>;

/// Main error type for table and query operations.
#[derive(Debug, Clone)]
pub struct OrmError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Categories of failures.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration
    ConfigError,

    // Connection
    ConnectionError,
    AuthenticationError,

    // Input
    ValidationError,

    // Query
    QueryError,
    QueryTimeout,

    // Administration
    AdminOperationError,
    TableNotFound,
    MissingTableSchema,

    // Data
    InvalidData,
    SerializationError,
    IoError,

    Unknown,
}

impl OrmError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the dynamic detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the call site that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches the originating error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        OrmError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
        }
    }
}

/// Errors compare by kind only.
impl PartialEq for OrmError {
    fn eq(&self, other: &OrmError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for OrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = self.detail.as_deref() {
            write!(f, "\n  Detail:")?;
            for line in detail.lines() {
                write!(f, "\n    {line}")?;
            }
        }

        Ok(())
    }
}

impl error::Error for OrmError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for OrmError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> OrmError {
        OrmError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for OrmError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> OrmError {
        OrmError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for OrmError {
    #[track_caller]
    fn from(err: std::io::Error) -> OrmError {
        let detail = err.to_string();
        OrmError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for OrmError {
    #[track_caller]
    fn from(err: serde_json::Error) -> OrmError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::SerializationError, "JSON conversion failed")
            }
        };

        let detail = err.to_string();
        OrmError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<chrono::ParseError> for OrmError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> OrmError {
        let detail = err.to_string();
        OrmError::from_components(
            ErrorKind::ValidationError,
            Cow::Borrowed("Date parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<ConfigValidationError> for OrmError {
    #[track_caller]
    fn from(err: ConfigValidationError) -> OrmError {
        let detail = err.to_string();
        OrmError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid connection configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
