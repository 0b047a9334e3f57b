use std::fmt;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Failures surfaced by an [`crate::EntityStore`] implementation.
///
/// None of these are retried by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (pool closed, connect/IO failure, timeout).
    Unavailable(String),
    /// A statement reached the store and failed there.
    Statement { op: &'static str, message: String },
    /// A uniqueness constraint rejected a write.
    Conflict { op: &'static str, message: String },
}

impl StoreError {
    pub fn statement(op: &'static str, message: impl Into<String>) -> Self {
        StoreError::Statement {
            op,
            message: message.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Statement { op, message } => write!(f, "{op} failed: {message}"),
            StoreError::Conflict { op, message } => write!(f, "{op} conflict: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Reconcile errors
// ---------------------------------------------------------------------------

/// Why a single reconciliation call failed. Nothing was written when any of
/// these is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileError {
    /// A required field was absent or null.
    MissingField { field: &'static str },
    /// A field was present but could not be converted.
    Validation {
        field: &'static str,
        value: String,
        reason: String,
    },
    Store(StoreError),
}

impl ReconcileError {
    pub fn validation(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        ReconcileError::Validation {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// True for caller-input problems (as opposed to store failures).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ReconcileError::MissingField { .. } | ReconcileError::Validation { .. }
        )
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::MissingField { field } => write!(f, "missing required field: {field}"),
            ReconcileError::Validation {
                field,
                value,
                reason,
            } => write!(f, "invalid value for {field} ({value:?}): {reason}"),
            ReconcileError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ReconcileError {
    fn from(e: StoreError) -> Self {
        ReconcileError::Store(e)
    }
}
