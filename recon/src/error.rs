//! Error types and result definitions for reconciliation runs.
//!
//! [`ReconError`] carries an [`ErrorKind`] used by callers to decide how to react (retry a
//! submission, report an unsupported dataset, abort), a static description, optional dynamic
//! detail, an optional source error, and the callsite where it was raised. Several errors can be
//! aggregated into one, which is used when both ingestion streams fail.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used throughout the crate.
pub type ReconResult<T> = Result<T, ReconError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the reconciliation engine.
#[derive(Debug, Clone)]
pub struct ReconError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    Many {
        errors: Vec<ReconError>,
        location: &'static Location<'static>,
    },
}

/// Categories of failures a reconciliation run can hit.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration
    ConfigError,
    UnsupportedDataset,

    // Remote export jobs
    SourceConnectionFailed,
    JobSubmissionRejected,
    JobFailed,
    JobTimeout,

    // Ingestion
    StreamReadFailed,
    IngestionTimeout,
    IngestionWorkerPanic,

    // Output
    OutputWriteFailed,

    // Data & state
    DeserializationError,
    InvalidState,
    IoError,

    Unknown,
}

impl ReconError {
    /// Returns the kind of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every kind contained in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { .. } => "multiple errors",
        }
    }

    /// Returns the dynamic detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the aggregated errors when this error wraps several failures.
    pub fn errors(&self) -> Option<&[ReconError]> {
        match self.repr {
            ErrorRepr::Single(_) => None,
            ErrorRepr::Many { ref errors, .. } => Some(errors),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Returns `true` when the failure happened at the network level.
    ///
    /// Transient failures leave the remote service state unknown but unchanged, so callers may
    /// resubmit. Semantic rejections such as malformed queries or missing permissions are never
    /// transient.
    pub fn is_transient(&self) -> bool {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind == ErrorKind::SourceConnectionFailed,
            ErrorRepr::Many { ref errors, .. } => {
                !errors.is_empty() && errors.iter().all(|err| err.is_transient())
            }
        }
    }

    /// Attaches an originating error, exposed through [`error::Error::source`].
    ///
    /// Has no effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        ReconError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for ReconError {
    fn eq(&self, other: &ReconError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                write!(f, "[{:?}] {}", payload.kind, payload.description)?;
                if let Some(detail) = payload.detail.as_deref() {
                    for (index, line) in detail.lines().enumerate() {
                        if index == 0 {
                            write!(f, ": {line}")?;
                        } else {
                            write!(f, "\n  {line}")?;
                        }
                    }
                }

                Ok(())
            }
            ErrorRepr::Many { errors, .. } => {
                write!(f, "[Many] {} errors aggregated", errors.len())?;
                for (index, error) in errors.iter().enumerate() {
                    write!(f, "\n  {}. {error}", index + 1)?;
                }

                Ok(())
            }
        }
    }
}

impl error::Error for ReconError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for ReconError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> ReconError {
        ReconError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for ReconError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> ReconError {
        ReconError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors; a single error is returned unwrapped.
impl<E> From<Vec<E>> for ReconError
where
    E: Into<ReconError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> ReconError {
        let location = Location::caller();
        let mut errors: Vec<ReconError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        ReconError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for ReconError {
    #[track_caller]
    fn from(err: std::io::Error) -> ReconError {
        let detail = err.to_string();
        ReconError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for ReconError {
    #[track_caller]
    fn from(err: serde_json::Error) -> ReconError {
        let detail = err.to_string();
        ReconError::from_components(
            ErrorKind::DeserializationError,
            Cow::Borrowed("JSON deserialization failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Classifies HTTP client failures.
///
/// Connection, timeout and request failures are network-level and therefore transient. Body
/// failures happen while a result stream is read.
impl From<reqwest::Error> for ReconError {
    #[track_caller]
    fn from(err: reqwest::Error) -> ReconError {
        let (kind, description) = if err.is_connect() || err.is_timeout() || err.is_request() {
            (
                ErrorKind::SourceConnectionFailed,
                "Export service could not be reached",
            )
        } else if err.is_body() {
            (ErrorKind::StreamReadFailed, "Export result stream failed")
        } else if err.is_decode() {
            (
                ErrorKind::DeserializationError,
                "Export service response could not be decoded",
            )
        } else {
            (ErrorKind::Unknown, "Export service request failed")
        };

        let detail = err.to_string();
        ReconError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
