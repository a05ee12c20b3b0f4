use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::{atomic, Atomic};

/// Error kinds for Estuary operations.
///
/// Each kind describes a distinct category of failure in the translation
/// layer, so callers can distinguish a malformed criteria object from a
/// connection problem or a failure reported by the underlying driver.
///
/// # Examples
///
/// ```rust,ignore
/// use estuary::errors::{EstuaryError, ErrorKind, EstuaryResult};
///
/// fn example() -> EstuaryResult<()> {
///     Err(EstuaryError::new("'where' must be a document", ErrorKind::CriteriaError))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// The criteria object could not be parsed into a query.
    /// Raised synchronously, before any connection is opened.
    CriteriaError,
    /// The schema definition is malformed (unknown type or attribute).
    SchemaError,
    /// A value does not satisfy its declared field type.
    ValidationError,
    /// A value has a type the operation cannot work with.
    InvalidDataType,
    /// Opening or closing the store connection failed.
    ConnectionError,
    /// The native driver reported a failure.
    DriverError,
    /// An update matched no records.
    NoRecordsFound,
    /// A unique index rejected a write.
    UniqueConstraintViolation,
    /// The requested collection does not exist in the store.
    CollectionNotFound,
    /// The operation is not valid in the current context.
    InvalidOperation,
    /// A record identifier is malformed.
    InvalidId,
    /// Internal error (usually indicates a bug).
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::CriteriaError => write!(f, "Criteria error"),
            ErrorKind::SchemaError => write!(f, "Schema error"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InvalidDataType => write!(f, "Invalid data type"),
            ErrorKind::ConnectionError => write!(f, "Connection error"),
            ErrorKind::DriverError => write!(f, "Driver error"),
            ErrorKind::NoRecordsFound => write!(f, "No records found"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::CollectionNotFound => write!(f, "Collection not found"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Estuary error type.
///
/// `EstuaryError` carries the error message, its kind, and an optional cause
/// for chaining driver failures under adapter-level errors. A backtrace is
/// captured at construction for debugging.
///
/// Every operation in this crate reports failure through this type; there is
/// no retry policy and no partial-failure reporting, so a single error is
/// always terminal for the operation that produced it.
#[derive(Clone)]
pub struct EstuaryError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<EstuaryError>>,
    backtrace: Atomic<Backtrace>,
}

impl EstuaryError {
    /// Creates a new `EstuaryError` with the specified message and kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        EstuaryError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `EstuaryError` with a cause error attached.
    ///
    /// The cause is preserved in the error chain and reported through
    /// [`Error::source`].
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: EstuaryError) -> Self {
        EstuaryError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&EstuaryError> {
        self.cause.as_deref()
    }
}

impl Display for EstuaryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for EstuaryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for EstuaryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for Estuary operations.
///
/// `EstuaryResult<T>` is shorthand for `Result<T, EstuaryError>`. Every
/// fallible operation in this crate returns it, preserving the error-first,
/// single-result completion contract of the adapter interface.
pub type EstuaryResult<T> = Result<T, EstuaryError>;

// From trait implementations for automatic error conversion
impl From<std::num::ParseIntError> for EstuaryError {
    fn from(err: std::num::ParseIntError) -> Self {
        EstuaryError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::InvalidDataType,
        )
    }
}

impl From<std::num::ParseFloatError> for EstuaryError {
    fn from(err: std::num::ParseFloatError) -> Self {
        EstuaryError::new(
            &format!("Float parsing error: {}", err),
            ErrorKind::InvalidDataType,
        )
    }
}

impl From<std::fmt::Error> for EstuaryError {
    fn from(err: std::fmt::Error) -> Self {
        EstuaryError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<String> for EstuaryError {
    fn from(msg: String) -> Self {
        EstuaryError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for EstuaryError {
    fn from(msg: &str) -> Self {
        EstuaryError::new(msg, ErrorKind::InternalError)
    }
}
